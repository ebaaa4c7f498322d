/// Connection state reported to the handler installed with
/// [`crate::RpcClient::set_state_change_handler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcTransportState {
    Connected,
    Disconnected,
}
