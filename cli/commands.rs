pub mod completion;
pub mod debug;
pub mod ignore;
pub mod rules;
pub mod snapshot;
