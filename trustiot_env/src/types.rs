//! Common identifier types shared by the engine and the simulator.

use serde::{Deserialize, Serialize};

/// Unique identifier for a simulated IoT device (task submitter).
///
/// Ordered lexicographically. Allocators break ties by position in the
/// setup list instead, so `module-2` and `module-10` keep their listed order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

/// Unique identifier for a simulated edge server.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(pub String);

macro_rules! impl_id {
    ($ty:ident) => {
        impl $ty {
            /// Creates an identifier of the form `{prefix}-{index}`.
            pub fn indexed(prefix: &str, index: usize) -> Self {
                Self(format!("{}-{}", prefix, index))
            }
            
            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
        
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
        
        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
        
        impl From<String> for $ty {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

impl_id!(DeviceId);
impl_id!(ServerId);

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_indexed_ids() {
        assert_eq!(DeviceId::indexed("module", 7).as_str(), "module-7");
        assert_eq!(ServerId::indexed("edge", 0).to_string(), "edge-0");
    }
    
    #[test]
    fn test_ids_are_ordered() {
        let a = ServerId::from("edge-a");
        let b = ServerId::from("edge-b");
        assert!(a < b);
    }
}
