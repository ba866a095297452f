mod builder;
mod container;
mod injectable;
mod resolver;

pub use builder::ContainerBuilder;
pub use container::{Concrete, Container, Factory, Lifecycle};
pub use injectable::{
    Arguments, Class, Constructor, Declared, Injectable, Instance, Parameter, identifier_of,
};
pub use resolver::{Overrides, Resolver};
pub(crate) use resolver::downcast_trait;
