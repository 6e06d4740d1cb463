//! Signature deciphering with an extracted profile

use super::profile::{CipherOperation, CipherProfile};

/// Recover the real signature from an obfuscated one using `profile`
pub fn decipher(profile: &CipherProfile, signature: &str) -> String {
    apply_operations(profile.operations(), signature)
}

/// Apply operations in order. Never fails: splice counts are clamped and swap
/// indices wrap modulo the current length.
pub fn apply_operations(operations: &[CipherOperation], signature: &str) -> String {
    let mut chars: Vec<char> = signature.chars().collect();

    for op in operations {
        match *op {
            CipherOperation::Reverse => chars.reverse(),
            CipherOperation::Splice(count) => {
                let count = count.min(chars.len());
                chars.drain(..count);
            }
            CipherOperation::Swap(index) => {
                if !chars.is_empty() {
                    let index = index % chars.len();
                    chars.swap(0, index);
                }
            }
        }
    }

    chars.into_iter().collect()
}
