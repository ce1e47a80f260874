pub mod dispatcher;
pub mod pacer;

pub use dispatcher::Dispatcher;
pub use pacer::Pacer;
