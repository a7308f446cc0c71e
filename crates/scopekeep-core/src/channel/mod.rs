//! Host method channel
//!
//! The host process forwards `createBookmark`, `resolveBookmark` and
//! `stopAccess` requests (plus token store methods) as JSON method calls.

mod protocol;
mod server;

pub use protocol::{ChannelError, Method, MethodCall, MethodHandler, MethodResponse};
pub use server::{ChannelHandle, ChannelRequest, ChannelServer};
