mod publish;

pub use publish::*;
