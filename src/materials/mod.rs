//! Materials and the module binder.

mod binder;
mod material;
mod module_instance;
mod textures;

pub use binder::MaterialBinder;
pub use material::{Material, MaterialId, MaterialRegistry, ParameterValue};
pub use module_instance::{ModuleInstance, UniformSlice};
pub use textures::TextureStore;
