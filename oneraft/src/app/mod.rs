use std::fmt;

/// A trait defining application specific data.
///
/// The intention of this trait is that applications which are using this crate
/// will be able to use their own concrete data types throughout their
/// application. OneRaft carries a command as-is through the log, the
/// `RaftStorage` and the network, and finally presents it to the
/// application's [`StateMachine`](crate::StateMachine).
///
/// ## Note
///
/// The trait is automatically implemented for all types which satisfy its
/// super traits.
pub trait AppData:
    fmt::Debug
    + Clone
    + Send
    + Sync
    + 'static
    + serde::Serialize
    + for<'a> serde::Deserialize<'a>
{
}

impl<T> AppData for T where T: fmt::Debug
        + Clone
        + Send
        + Sync
        + 'static
        + serde::Serialize
        + for<'a> serde::Deserialize<'a>
{
}
