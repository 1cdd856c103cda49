pub mod resources;

pub use resources::{AttachedPolicy, CreatePolicyInput, CreateRoleInput, IamRole};
