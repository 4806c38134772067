//! Call data for session transactions, built from user-entered argument strings.

use alloy_primitives::Bytes;
use ethers::abi::{
    param_type::Reader,
    token::{LenientTokenizer, Tokenizer},
    Token,
};

use crate::{abi::AbiFunction, error::CalldataError};

/// `selector || abi.encode(args)` for `function`; native transfer encodes to empty call data.
///
/// Each argument is parsed leniently against its declared type (decimal or hex integers,
/// `true`/`false`, hex bytes, `[a,b]` arrays, `(a,b)` tuples).
pub fn encode_function_call(function: &AbiFunction, args: &[String]) -> Result<Bytes, CalldataError> {
    if function.is_native_transfer() {
        return Ok(Bytes::new());
    }
    if function.inputs.len() != args.len() {
        return Err(CalldataError::ArgumentCount {
            function: function.name.clone(),
            expected: function.inputs.len(),
            got: args.len(),
        });
    }

    let tokens = function
        .inputs
        .iter()
        .zip(args)
        .map(|(param, value)| {
            let kind = param.canonical_type();
            let param_type = Reader::read(&kind).map_err(|e| CalldataError::InvalidType {
                kind: kind.clone(),
                reason: e.to_string(),
            })?;
            LenientTokenizer::tokenize(&param_type, value.trim()).map_err(|e| CalldataError::InvalidValue {
                value: value.clone(),
                kind,
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<Token>, CalldataError>>()?;

    let mut data = function.selector().to_vec();
    data.extend_from_slice(&ethers::abi::encode(&tokens));
    Ok(Bytes::from(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::AbiParam;

    fn param(name: &str, kind: &str) -> AbiParam {
        AbiParam { name: name.into(), kind: kind.into(), components: vec![] }
    }

    fn transfer() -> AbiFunction {
        AbiFunction {
            name: "transfer".into(),
            state_mutability: "nonpayable".into(),
            inputs: vec![param("to", "address"), param("amount", "uint256")],
            outputs: vec![param("", "bool")],
        }
    }

    #[test]
    fn encodes_transfer() {
        let data = encode_function_call(
            &transfer(),
            &["0x000000000000000000000000000000000000dEaD".into(), "1000".into()],
        )
        .unwrap();
        assert_eq!(&data[0..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[4 + 30..4 + 32], &[0xde, 0xad]);
        assert_eq!(&data[4 + 62..4 + 64], &[0x03, 0xe8]);
    }

    #[test]
    fn native_transfer_has_no_call_data() {
        assert!(encode_function_call(&AbiFunction::native_transfer(), &[]).unwrap().is_empty());
    }

    #[test]
    fn argument_count_is_checked() {
        let err = encode_function_call(&transfer(), &["0x00".into()]).unwrap_err();
        assert!(matches!(err, CalldataError::ArgumentCount { expected: 2, got: 1, .. }));
    }

    #[test]
    fn bad_values_are_reported() {
        let err = encode_function_call(&transfer(), &["not-an-address".into(), "1".into()]).unwrap_err();
        assert!(matches!(err, CalldataError::InvalidValue { .. }));
    }
}
