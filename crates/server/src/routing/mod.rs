//! Channel routing: target resolution, private pairings, delivery policy

pub mod key;
pub mod router;

pub use key::{is_valid_group_name, is_valid_identity, PrivateChannelKey, PRIVATE_SEPARATOR};
pub use router::{delivery_policy, ChannelKind, ChannelRouter, DeliveryPolicy, ResolvedTarget};
