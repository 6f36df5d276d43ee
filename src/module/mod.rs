//! 模块子系统
//!
//! 包含模块描述符、子选项模式、注册表、生命周期执行器和卸载上下文。

pub mod descriptor;
pub mod registry;
pub mod runner;
pub mod suboption;
pub mod unloader;

// 重导出常用类型
pub use descriptor::{
    DescriptorBuilder, InstanceInfo, ModuleDescriptor, ModuleState, ModuleSummary,
};
pub use registry::{ModuleRegistry, RegistrationHandle};
pub use runner::{LifecycleRunner, StoredValues};
pub use suboption::{
    resolve_options, ResolvedOptions, Suboption, SuboptionKind, SuboptionSchema,
    SuboptionValidator,
};
pub use unloader::{ContextState, Removable, UnloaderContext};
