//! Ordered list of session actions, edited by replacement.

use alloy_primitives::{Address, FixedBytes};

use smart_session_types::{Action, ActionField, FunctionSelector, PolicyData, NATIVE_TRANSFER_SELECTOR};

use crate::{
    abi::{self, AbiFilter, AbiSource, AbiState, NATIVE_TRANSFER},
    encoder::selector,
    error::RegistryError,
    session::sudo_policy,
};

/// Editing rules for action rows. Every edit returns a fresh list; inputs are never mutated.
#[derive(Clone, Debug)]
pub struct ActionRegistry {
    default_policies: Vec<PolicyData>,
    filter: AbiFilter,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new(vec![sudo_policy()], AbiFilter::default())
    }
}

impl ActionRegistry {
    pub fn new(default_policies: Vec<PolicyData>, filter: AbiFilter) -> Self {
        Self { default_policies, filter }
    }

    pub fn add(&self, actions: &[Action], action: Action) -> Vec<Action> {
        let mut next = actions.to_vec();
        next.push(action);
        next
    }

    /// Append a placeholder row (null target, zero selector, default policies).
    pub fn add_default(&self, actions: &[Action]) -> Vec<Action> {
        self.add(actions, Action::unset(self.default_policies.clone()))
    }

    /// Append `target`/`selector` with the default policies.
    pub fn add_call(&self, actions: &[Action], target: Address, selector: FunctionSelector) -> Vec<Action> {
        self.add(actions, Action::new(target, selector, self.default_policies.clone()))
    }

    pub fn remove(&self, actions: &[Action], index: usize) -> Result<Vec<Action>, RegistryError> {
        check_index(actions, index)?;
        Ok(actions
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, a)| a.clone())
            .collect())
    }

    pub fn update(
        &self,
        actions: &[Action],
        index: usize,
        field: ActionField,
    ) -> Result<Vec<Action>, RegistryError> {
        check_index(actions, index)?;
        let mut next = actions.to_vec();
        match field {
            ActionField::Target(target) => next[index].target = target,
            ActionField::Selector(selector) => next[index].selector = selector,
        }
        Ok(next)
    }

    /// Selector options for `target`, never failing: an unusable ABI yields only native transfer.
    pub async fn resolve_selectors<S: AbiSource + ?Sized>(&self, source: &S, target: Address) -> AbiState {
        abi::resolve(source, &self.filter, target).await
    }
}

fn check_index(actions: &[Action], index: usize) -> Result<(), RegistryError> {
    if index >= actions.len() {
        return Err(RegistryError::IndexOutOfRange { index, len: actions.len() });
    }
    Ok(())
}

/// Parse `0x`-prefixed 4-byte hex, a function signature such as `transfer(address,uint256)`,
/// or `native-transfer`.
pub fn parse_selector(input: &str) -> Result<FunctionSelector, RegistryError> {
    let input = input.trim();
    if input == NATIVE_TRANSFER {
        return Ok(NATIVE_TRANSFER_SELECTOR);
    }
    if let Some(hex_part) = input.strip_prefix("0x") {
        let raw = hex::decode(hex_part).map_err(|_| RegistryError::InvalidSelector(input.to_string()))?;
        let bytes: [u8; 4] = raw
            .try_into()
            .map_err(|_| RegistryError::InvalidSelector(input.to_string()))?;
        return Ok(FixedBytes(bytes));
    }
    if is_signature(input) {
        return Ok(selector(&input.replace(' ', "")));
    }
    Err(RegistryError::InvalidSelector(input.to_string()))
}

fn is_signature(input: &str) -> bool {
    let Some(open) = input.find('(') else {
        return false;
    };
    let name = &input[..open];
    let starts_ok = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    starts_ok && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') && input.ends_with(')')
}
