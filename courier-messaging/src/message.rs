//! Messages received from the broker

/// One message handed to the consumer, still awaiting ack or nack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Channel-scoped tag used to settle the message
    pub delivery_tag: u64,
    /// Raw message body
    pub body: Vec<u8>,
    /// Set when the broker has delivered this message before
    pub redelivered: bool,
}

impl Delivery {
    pub fn new(delivery_tag: u64, body: impl Into<Vec<u8>>) -> Self {
        Self {
            delivery_tag,
            body: body.into(),
            redelivered: false,
        }
    }
}

#[cfg(feature = "rabbitmq")]
impl From<lapin::message::Delivery> for Delivery {
    fn from(delivery: lapin::message::Delivery) -> Self {
        Self {
            delivery_tag: delivery.delivery_tag,
            redelivered: delivery.redelivered,
            body: delivery.data,
        }
    }
}
