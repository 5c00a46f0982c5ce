//! Contract model: the abstract call graph every analysis runs over.

pub mod loader;
pub mod schema;
pub mod types;

pub use loader::{parse_document, DocumentFormat, ModelLoader};
pub use schema::ContractDocument;
pub use types::{
    AssetFlow, Builtin, CheckKind, ContractModel, FieldRole, FunctionModel, MessageField,
    Mutability, Operation, OperationKind, Parameter, ReturnDataHandling, StateVariable, ValueRef,
    Visibility, WriteEffect,
};
