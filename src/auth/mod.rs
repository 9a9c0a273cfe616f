mod record;

pub use record::{
    Auth, AuthUpdate, Metadata, Provider, Quota, Runtime, SharedCredentialRef, Status,
    UpdateAction,
};
