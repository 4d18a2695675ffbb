pub mod fal_queue;
pub mod freepik;
pub mod replicate;
pub mod runway;
pub(crate) mod wire;
