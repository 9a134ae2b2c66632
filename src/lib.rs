// Library entry exposing assembler modules.
pub mod cli;
pub mod codegen;
pub mod env;
pub mod error;
pub mod expr;
pub mod frontend;
pub mod ir;
pub mod opcodes;
pub mod passes;
pub mod pipeline;
