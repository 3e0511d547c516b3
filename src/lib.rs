//! A NAS assembler and fetch/execute simulator for the Nilsson Instructional Computer (NIC).
//!
//! The NIC is a small teaching processor with 16 byte-sized registers
//! and 256 cells of 4-bit memory. Its assembly language (NAS) is line-based:
//! one instruction, label definition or `word` directive per line.
//!
//! # Usage
//!
//! To convert NAS source code to an executable, it must be parsed and assembled.
//! [`asm::assemble_src`] does both, collecting every error found:
//! ```
//! use nic_ensemble::asm::{assemble_src, MAX_ERRORS};
//! use nic_ensemble::asm::encoding::{ExeFormat, TextFormat};
//!
//! let code = "
//!     loadc r1 5      // r1 = 5
//!     addc r1 3       // r1 += 3
//!     store r1 0xe0
//!     halt
//! ";
//! let exe = assemble_src(code, MAX_ERRORS).unwrap();
//!
//! // The text form of the executable:
//! assert_eq!(TextFormat::serialize(&exe), "1f1f1f1f2105810341e000000000f000\n");
//! ```
//!
//! The parsing and assembling steps can also be done separately,
//! with [`parse::parse_ast`] and [`asm::assemble`].
//!
//! Once an executable has been created, it can be executed with the simulator:
//! ```
//! # use nic_ensemble::asm::{assemble_src, MAX_ERRORS};
//! # let exe = assemble_src("loadc r1 5\naddc r1 3\nstore r1 0xe0\nhalt\n", MAX_ERRORS).unwrap();
//! use nic_ensemble::sim::{Machine, Status};
//!
//! let mut machine = Machine::new(Default::default());
//! machine.load(&exe);
//! assert_eq!(machine.run(), Ok(Status::Halt)); // <-- Result can be handled accordingly
//!
//! // Or, run it with an input and read the output region:
//! let output = machine.execute_io("").unwrap();
//! assert!(output.starts_with("08"));
//! ```
//!
//! If more granularity is needed for simulation, there are also fetch, execute and step functions,
//! as well as a runner which executes the machine on a background thread.
//! See the [`sim`] module for more details.
#![warn(missing_docs)]

pub mod parse;
pub mod ast;
pub mod asm;
pub mod sim;
pub mod err;
