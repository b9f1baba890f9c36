pub use fcm_tokio_transport::{TokioTlsTransport, TokioTlsTransportFactory};
pub use fcmcore::net::{Transport, TransportEvent, TransportFactory};
