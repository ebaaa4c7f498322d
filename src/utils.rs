mod generate_request_id;
pub use generate_request_id::*;

mod now;
pub use now::*;
