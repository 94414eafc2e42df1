pub mod channel;
pub mod websocket;

pub use channel::{
    ChangeFilter, RealtimeChannel, RealtimeError, RowEvent, RowEventKind, Subscription,
    SubscriptionRequest, TableName,
};
pub use websocket::WebSocketRealtimeChannel;
