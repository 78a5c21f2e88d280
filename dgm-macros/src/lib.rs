use std::{error::Error, fmt};

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Lit};

#[derive(Debug, PartialEq, Eq)]
enum HexError {
    InvalidCharacter(char),
    InvalidStringLength(usize),
}

impl Error for HexError {}

impl fmt::Display for HexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidCharacter(char) => {
                write!(f, "invalid character {char} in address literal")
            }
            Self::InvalidStringLength(length) => {
                write!(f, "address literal has {length} hex digits, expected 40")
            }
        }
    }
}

fn decode_address(hex: &str) -> Result<[u8; 20], HexError> {
    let hex = hex.strip_prefix("0x").or_else(|| hex.strip_prefix("0X")).unwrap_or(hex);
    // Integer literals may carry `_` separators.
    let digits: Vec<u8> = hex.bytes().filter(|b| *b != b'_').collect();
    if digits.len() != 40 {
        return Err(HexError::InvalidStringLength(digits.len()));
    }

    let hex_value = |char: u8| -> Result<u8, HexError> {
        match char {
            b'A'..=b'F' => Ok(char - b'A' + 10),
            b'a'..=b'f' => Ok(char - b'a' + 10),
            b'0'..=b'9' => Ok(char - b'0'),
            _ => Err(HexError::InvalidCharacter(char as char)),
        }
    };

    let mut bytes = [0u8; 20];
    for (byte, chunk) in bytes.iter_mut().zip(digits.chunks(2)) {
        *byte = hex_value(chunk[0])? << 4 | hex_value(chunk[1])?;
    }
    Ok(bytes)
}

/// Builds an `ethers::types::Address` from a hex literal at compile time.
///
/// Accepts either a bare literal, `address!(0x39053D51B77DC0d36036Fc1fCc8Cb819df8Ef37A)`, or a
/// string, `address!("0x39053D51B77DC0d36036Fc1fCc8Cb819df8Ef37A")`. Malformed input is a
/// compile error rather than a runtime parse failure.
#[proc_macro]
pub fn address(input: TokenStream) -> TokenStream {
    let lit = parse_macro_input!(input as Lit);
    let (text, span) = match &lit {
        Lit::Int(int) => (int.to_string(), int.span()),
        Lit::Str(string) => (string.value(), string.span()),
        other => {
            return syn::Error::new(other.span(), "expected a hex address literal")
                .to_compile_error()
                .into()
        }
    };

    match decode_address(&text) {
        Ok(bytes) => quote! {
            ::ethers::types::H160([#(#bytes,)*])
        }
        .into(),
        Err(e) => syn::Error::new(span, e).to_compile_error().into(),
    }
}
