mod linear;
mod module;
mod net;

pub use linear::Linear;
pub use module::Module;
pub use net::{Net, IMAGE_FEATURES, NUM_CLASSES};
