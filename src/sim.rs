//! Simulating and execution for NIC machine code.
//!
//! This module is focused on executing fully assembled code (i.e., [`Executable`]).
//!
//! This module consists of:
//! - [`Machine`]: The struct that simulates assembled code.
//! - [`mem`]: The module handling memory and the register file.
//! - [`observer`]: The module handling change notifications for presentation layers.
//! - [`runner`]: The module handling continuous execution on a worker thread.
//!
//! # Usage
//!
//! To simulate some code, you need to instantiate a Machine and load an executable to it:
//!
//! ```
//! use nic_ensemble::asm::{assemble_src, MAX_ERRORS};
//! use nic_ensemble::ast::reg_consts::R1;
//! use nic_ensemble::sim::{Machine, Status};
//!
//! let src = "
//!     loadc r1 0
//!     addc r1 1
//!     addc r1 1
//!     addc r1 1
//!     halt
//! ";
//! let exe = assemble_src(src, MAX_ERRORS).unwrap();
//!
//! let mut machine = Machine::new(Default::default());
//! machine.load(&exe);
//!
//! // Running step by step:
//! machine.step_in().unwrap();
//! assert_eq!(machine.reg(R1), 0);
//! machine.step_in().unwrap();
//! assert_eq!(machine.reg(R1), 1);
//!
//! // Running to the end:
//! assert_eq!(machine.run(), Ok(Status::Halt));
//! assert_eq!(machine.reg(R1), 3);
//! ```
//!
//! ## Phases
//!
//! Every instruction is processed in two phases, [`Machine::fetch`] and [`Machine::execute`],
//! which must be called alternately. [`Machine::phase`] tells which one is next,
//! and [`Machine::step`] calls it.
//!
//! ## Status
//!
//! The outcome of the program is reported through the status register ([`Status`]),
//! never as an `Err`. `Err(`[`SimErr`]`)` is only returned for misuse
//! (such as calling the wrong phase) and for invalid input.
//!
//! ## Flags
//!
//! The machine is configured with [`SimFlags`]:
//!
//! ```
//! # use nic_ensemble::sim::{Machine, SimFlags};
//! let machine = Machine::new(SimFlags { max_steps: 500, ..Default::default() });
//! ```

pub mod mem;
pub mod observer;
pub mod runner;

use std::time::Duration;

use crate::asm::encoding::{ExeErr, ExeFormat, TextFormat};
use crate::asm::Executable;
use crate::ast::reg_consts::R0;
use crate::ast::sim::SimInstr;
use crate::ast::Reg;

use self::mem::{Mem, RegFile};
use self::observer::{Change, ChangeObserver};

/// Errors that can occur during simulation.
///
/// These are usage errors. The program's own failures are reported by the [`Status`] register.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SimErr {
    /// A phase was called out of order (e.g., two fetches in a row).
    WrongPhase,
    /// The machine was being run continuously, so it could not be stepped manually.
    Running,
    /// The program did not halt within the configured number of steps.
    StepLimit,
    /// The executable could not be read.
    InvalidExe(ExeErr),
    /// The input contained a non-hex character.
    InvalidInput,
    /// The input did not fit in the input region.
    InputTooLarge,
    /// The program stopped without halting.
    NotHalted(Status),
}
impl std::fmt::Display for SimErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimErr::WrongPhase     => f.write_str("phase called out of order"),
            SimErr::Running        => f.write_str("machine is running"),
            SimErr::StepLimit      => f.write_str("program did not halt within the step limit"),
            SimErr::InvalidExe(e)  => write!(f, "invalid executable: {e}"),
            SimErr::InvalidInput   => f.write_str("input is not a hex string"),
            SimErr::InputTooLarge  => f.write_str("input does not fit in the input region"),
            SimErr::NotHalted(s)   => write!(f, "program stopped with status {s}"),
        }
    }
}
impl std::error::Error for SimErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimErr::InvalidExe(e) => Some(e),
            _ => None
        }
    }
}
impl crate::err::Error for SimErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            SimErr::WrongPhase => Some("fetch and execute must alternate, use `Machine::phase` to check which is next".into()),
            SimErr::Running => Some("stop the machine before stepping it".into()),
            SimErr::StepLimit => Some("the program may be in an infinite loop, or the step limit may be too low".into()),
            SimErr::InvalidExe(e) => crate::err::Error::help(e),
            SimErr::InvalidInput => Some("input is written as hex digits, one per memory cell".into()),
            SimErr::InputTooLarge => None,
            SimErr::NotHalted(Status::BadAlignment) => Some("the program counter was not a multiple of 4".into()),
            SimErr::NotHalted(Status::BadInstruction) => Some("the program tried to run a word that is not an instruction (e.g., data)".into()),
            SimErr::NotHalted(_) => None,
        }
    }
}

/// The status register.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default)]
pub enum Status {
    /// The machine is running normally.
    #[default]
    Ok = 0,
    /// The program executed `halt`.
    Halt = 1,
    /// The fetched word is not an instruction.
    BadInstruction = 2,
    /// The program counter is not a multiple of 4.
    BadAlignment = 3,
}
impl Status {
    /// The numeric code of this status.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether this status stops the machine until it is reset.
    ///
    /// `Halt` is not terminal, because fetching after a halt resumes the machine.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::BadInstruction | Status::BadAlignment)
    }
}
impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Ok             => f.write_str("ok"),
            Status::Halt           => f.write_str("halt"),
            Status::BadInstruction => f.write_str("bad instruction"),
            Status::BadAlignment   => f.write_str("bad alignment"),
        }
    }
}

/// The phase the machine performs next.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default)]
pub enum Phase {
    /// The next phase reads an instruction into the instruction register.
    #[default]
    Fetch,
    /// The next phase executes the instruction register.
    Execute,
}

/// A region of memory used for input or output by [`Machine::execute_io`].
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct IoRegion {
    /// The first cell of the region.
    pub start: u8,
    /// The number of cells in the region.
    pub cells: u16,
}
impl IoRegion {
    /// The addresses of every cell in the region (wrapping around the end of memory).
    ///
    /// A region never covers a cell twice, so this yields at most 256 addresses.
    pub fn addrs(self) -> impl Iterator<Item=u8> {
        (0..=u8::MAX)
            .take(usize::from(self.cells))
            .map(move |i| self.start.wrapping_add(i))
    }
}

/// Configuration flags for [`Machine`].
///
/// These can be modified after the `Machine` is created with [`Machine::new`]
/// and their effects should still apply.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SimFlags {
    /// The maximum number of instructions [`Machine::execute_io`] runs before giving up.
    ///
    /// By default, this is `100_000`.
    pub max_steps: u64,

    /// Where [`Machine::execute_io`] writes its input.
    ///
    /// By default, this is the 32 cells starting at `0xc0`.
    pub input: IoRegion,

    /// Where [`Machine::execute_io`] reads its output.
    ///
    /// By default, this is the 32 cells starting at `0xe0`.
    pub output: IoRegion,

    /// The delay between instructions when run continuously by [`runner::Computer`].
    ///
    /// By default, this is 100 ms.
    pub interval: Duration,
}
impl Default for SimFlags {
    fn default() -> Self {
        Self {
            max_steps: 100_000,
            input: IoRegion { start: 0xC0, cells: 32 },
            output: IoRegion { start: 0xE0, cells: 32 },
            interval: Duration::from_millis(100),
        }
    }
}

/// A copy of the machine's visible state.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MachineState {
    /// The register file.
    pub regs: [u8; Reg::COUNT],
    /// The program counter.
    pub pc: u8,
    /// The instruction register.
    pub ir: u16,
    /// The next-instruction register.
    pub nr: u8,
    /// The status register.
    pub status: Status,
    /// The next phase.
    pub phase: Phase,
    /// Every memory cell.
    pub mem: Vec<u8>,
    /// The number of instructions executed since the last reset.
    pub instructions_run: u64,
}

/// Executes assembled code.
#[derive(Debug)]
pub struct Machine {
    // ------------------ SIMULATION STATE ------------------
    // Calling [`Machine::reset`] resets these values.
    mem: Mem,
    regs: RegFile,
    pc: u8,
    ir: u16,
    nr: u8,
    sr: Status,
    phase: Phase,

    /// The number of instructions successfully run since this `Machine` was last reset.
    pub instructions_run: u64,

    // ------------------ CONFIG/DEBUG STATE ------------------
    // Machine configuration, kept through resets.

    /// The loaded image, which is copied into memory on every reset.
    image: Vec<u8>,

    /// Tracks changes to the machine state.
    pub observer: ChangeObserver,

    /// Configuration settings for the machine.
    pub flags: SimFlags,
}
impl Machine {
    /// Creates a new machine with the provided initializers and no loaded program.
    pub fn new(flags: SimFlags) -> Self {
        Self {
            mem: Mem::new(),
            regs: RegFile::new(),
            pc: 0,
            ir: 0,
            nr: 0,
            sr: Status::Ok,
            phase: Phase::Fetch,
            instructions_run: 0,
            image: vec![],
            observer: ChangeObserver::new(),
            flags,
        }
    }

    /// Loads an executable into the machine, then resets it.
    pub fn load(&mut self, exe: &Executable) {
        self.image = exe.image().to_vec();
        tracing::debug!(blocks = self.image.len(), "loaded image");
        self.reset();
    }

    /// Loads an executable from its text form, then resets the machine.
    ///
    /// ```
    /// use nic_ensemble::sim::{Machine, SimErr};
    /// use nic_ensemble::asm::encoding::ExeErr;
    ///
    /// let mut machine = Machine::default();
    /// assert!(machine.load_text("1f1f1f1f21050000f000\n").is_ok());
    /// assert_eq!(machine.load_text("21050000f000"), Err(SimErr::InvalidExe(ExeErr::BadHeader)));
    /// ```
    pub fn load_text(&mut self, text: &str) -> Result<(), SimErr> {
        let exe = TextFormat::deserialize(text).map_err(SimErr::InvalidExe)?;
        self.load(&exe);
        Ok(())
    }

    /// Resets the machine.
    ///
    /// This zeroes the registers and memory, then copies the loaded image back into memory.
    /// Every part of the state is reported to the observer as changed.
    pub fn reset(&mut self) {
        self.mem.clear();
        self.mem.copy_image(&self.image);
        self.regs = RegFile::new();
        self.pc = 0;
        self.ir = 0;
        self.nr = 0;
        self.sr = Status::Ok;
        self.phase = Phase::Fetch;
        self.instructions_run = 0;

        self.observer.clear();
        for r in Reg::all() {
            self.observer.notify(Change::Reg(r));
        }
        for change in [Change::Pc, Change::Ir, Change::Nr, Change::Sr] {
            self.observer.notify(change);
        }
        for addr in 0..=u8::MAX {
            self.observer.notify(Change::Mem(addr));
        }
        tracing::debug!("reset machine");
    }

    /// Gets the value of a register.
    pub fn reg(&self, r: Reg) -> u8 {
        self.regs[r]
    }
    /// Gets the program counter.
    pub fn pc(&self) -> u8 {
        self.pc
    }
    /// Gets the instruction register.
    pub fn ir(&self) -> u16 {
        self.ir
    }
    /// Gets the next-instruction register.
    pub fn nr(&self) -> u8 {
        self.nr
    }
    /// Gets the status register.
    pub fn status(&self) -> Status {
        self.sr
    }
    /// Gets the phase that is performed next.
    pub fn phase(&self) -> Phase {
        self.phase
    }
    /// Gets the memory.
    pub fn mem(&self) -> &Mem {
        &self.mem
    }
    /// Gets the loaded image.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// The four memory cells holding the instruction at the program counter.
    pub fn active_range(&self) -> [u8; 4] {
        [0, 1, 2, 3].map(|i| self.pc.wrapping_add(i))
    }

    /// Copies the visible state of the machine.
    pub fn snapshot(&self) -> MachineState {
        MachineState {
            regs: *self.regs.as_array(),
            pc: self.pc,
            ir: self.ir,
            nr: self.nr,
            status: self.sr,
            phase: self.phase,
            mem: self.mem.as_slice().to_vec(),
            instructions_run: self.instructions_run,
        }
    }

    /// Sets a register, notifying the observer.
    pub fn set_reg(&mut self, r: Reg, value: u8) {
        if self.regs[r] != value {
            self.regs[r] = value;
            self.observer.notify(Change::Reg(r));
        }
    }
    /// Sets the program counter, notifying the observer.
    pub fn set_pc(&mut self, pc: u8) {
        if self.pc != pc {
            self.pc = pc;
            self.observer.notify(Change::Pc);
        }
    }
    /// Sets a 4-bit memory cell, notifying the observer.
    ///
    /// Only the low 4 bits of `value` are kept.
    pub fn write_mem(&mut self, addr: u8, value: u8) {
        if self.mem.get_raw(addr) != value & 0xF {
            self.mem.set_raw(addr, value);
            self.observer.notify(Change::Mem(addr));
        }
    }

    fn write_byte(&mut self, addr: u8, value: u8) {
        let cells = [addr, addr.wrapping_add(1)];
        let prev = cells.map(|cell| self.mem.get_raw(cell));

        self.mem.write_byte(addr, value);
        for (cell, old) in cells.into_iter().zip(prev) {
            if self.mem.get_raw(cell) != old {
                self.observer.notify(Change::Mem(cell));
            }
        }
    }
    fn set_ir(&mut self, ir: u16) {
        if self.ir != ir {
            self.ir = ir;
            self.observer.notify(Change::Ir);
        }
    }
    fn set_nr(&mut self, nr: u8) {
        if self.nr != nr {
            self.nr = nr;
            self.observer.notify(Change::Nr);
        }
    }
    fn set_status(&mut self, sr: Status) {
        if self.sr != sr {
            self.sr = sr;
            self.observer.notify(Change::Sr);
        }
    }

    /// Performs the fetch phase.
    ///
    /// This reads the instruction at the program counter into the instruction register
    /// and sets the next-instruction register to the following instruction.
    ///
    /// If the program counter is not a multiple of 4, this instead sets the status to
    /// [`Status::BadAlignment`] and the machine stops.
    pub fn fetch(&mut self) -> Result<Status, SimErr> {
        if self.sr.is_terminal() {
            return Ok(self.sr);
        }
        if self.phase != Phase::Fetch {
            return Err(SimErr::WrongPhase);
        }

        if self.pc % 4 != 0 {
            tracing::debug!(pc = self.pc, "unaligned program counter");
            self.set_status(Status::BadAlignment);
            return Ok(self.sr);
        }

        let ir = self.mem.read_word(self.pc);
        tracing::trace!(pc = self.pc, "fetched {ir:04x}");
        self.set_ir(ir);
        self.set_nr(self.pc.wrapping_add(4));
        self.set_status(Status::Ok);
        self.phase = Phase::Execute;
        Ok(self.sr)
    }

    /// Performs the execute phase.
    ///
    /// This decodes and executes the instruction register, then moves the program counter
    /// to the next instruction (or the jump target).
    ///
    /// If the instruction register does not hold an instruction, this instead sets the status to
    /// [`Status::BadInstruction`] and the machine stops.
    pub fn execute(&mut self) -> Result<Status, SimErr> {
        if self.sr.is_terminal() {
            return Ok(self.sr);
        }
        if self.phase != Phase::Execute {
            return Err(SimErr::WrongPhase);
        }
        self.phase = Phase::Fetch;

        let Some(instr) = SimInstr::decode(self.ir) else {
            tracing::debug!(pc = self.pc, "bad instruction {:04x}", self.ir);
            self.set_status(Status::BadInstruction);
            return Ok(self.sr);
        };
        tracing::trace!(pc = self.pc, "executing {instr}");

        let mut next_pc = self.nr;
        match instr {
            SimInstr::Halt => self.set_status(Status::Halt),
            SimInstr::Load(a, x)   => self.set_reg(a, self.mem.read_byte(x)),
            SimInstr::LoadC(a, c)  => self.set_reg(a, c),
            SimInstr::LoadR(a, b)  => self.set_reg(a, self.mem.read_byte(self.regs[b])),
            SimInstr::Store(a, x)  => self.write_byte(x, self.regs[a]),
            SimInstr::StoreR(a, b) => self.write_byte(self.regs[b], self.regs[a]),
            SimInstr::Move(a, b)   => self.set_reg(a, self.regs[b]),
            SimInstr::Add(a, b, c) => self.set_reg(a, self.regs[b].wrapping_add(self.regs[c])),
            SimInstr::AddC(a, c)   => self.set_reg(a, self.regs[a].wrapping_add(c)),
            SimInstr::Mul(a, b, c) => self.set_reg(a, self.regs[b].wrapping_mul(self.regs[c])),
            SimInstr::Sub(a, b, c) => self.set_reg(a, self.regs[b].wrapping_sub(self.regs[c])),
            SimInstr::Shift(a, b, c) => self.set_reg(a, shift(self.regs[b], self.regs[c] as i8)),
            SimInstr::And(a, b, c) => self.set_reg(a, self.regs[b] & self.regs[c]),
            SimInstr::Or(a, b, c)  => self.set_reg(a, self.regs[b] | self.regs[c]),
            SimInstr::Xor(a, b, c) => self.set_reg(a, self.regs[b] ^ self.regs[c]),
            SimInstr::Jump { reg, cond, target } => {
                if cond.holds(self.regs[reg] as i8, self.regs[R0] as i8) {
                    next_pc = target;
                }
            },
        }

        self.set_pc(next_pc);
        self.instructions_run += 1;
        Ok(self.sr)
    }

    /// Performs the next phase (fetch or execute).
    pub fn step(&mut self) -> Result<Status, SimErr> {
        match self.phase {
            Phase::Fetch   => self.fetch(),
            Phase::Execute => self.execute(),
        }
    }

    /// Completes one instruction.
    ///
    /// If the machine is about to fetch, this fetches and executes.
    /// If the instruction was already fetched, this only executes.
    pub fn step_in(&mut self) -> Result<Status, SimErr> {
        if self.phase == Phase::Fetch {
            let status = self.fetch()?;
            if status != Status::Ok {
                return Ok(status);
            }
        }
        self.execute()
    }

    /// Runs until the tripwire condition returns false or the status is no longer [`Status::Ok`].
    ///
    /// This returns the status when the run stopped,
    /// which is [`Status::Ok`] if the tripwire stopped it.
    pub fn run_while(&mut self, mut tripwire: impl FnMut(&mut Machine) -> bool) -> Result<Status, SimErr> {
        loop {
            if !tripwire(self) {
                break Ok(self.sr);
            }

            let status = self.step_in()?;
            if status != Status::Ok {
                break Ok(status);
            }
        }
    }

    /// Runs the program until it stops.
    ///
    /// This blocks until the program ends.
    /// If you would like to limit the maximum number of steps to execute, consider [`Machine::run_with_limit`].
    pub fn run(&mut self) -> Result<Status, SimErr> {
        self.run_while(|_| true)
    }

    /// Runs the program with a limit on how many instructions to execute.
    ///
    /// If the limit is reached, this returns `Ok(Status::Ok)`.
    pub fn run_with_limit(&mut self, max_steps: u64) -> Result<Status, SimErr> {
        let i = self.instructions_run;
        self.run_while(|m| m.instructions_run.wrapping_sub(i) < max_steps)
    }

    /// Runs the loaded program on the given input, returning its output.
    ///
    /// This:
    /// 1. resets the machine,
    /// 2. writes the input (one hex digit per cell) into the input region,
    /// 3. runs until the program halts (at most [`SimFlags::max_steps`] instructions),
    /// 4. returns the output region as a hex string.
    ///
    /// ```
    /// use nic_ensemble::sim::Machine;
    ///
    /// let mut machine = Machine::default();
    /// // load r1 0xc0; store r1 0xe0; halt
    /// machine.load_text("1f1f1f1f11c041e000000000f000").unwrap();
    ///
    /// let output = machine.execute_io("a5").unwrap();
    /// assert!(output.starts_with("a50"));
    /// assert_eq!(output.len(), 32);
    /// ```
    pub fn execute_io(&mut self, input: &str) -> Result<String, SimErr> {
        self.reset();

        let input = input.trim();
        let digits = input.chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<Vec<_>>>()
            .ok_or(SimErr::InvalidInput)?;
        if digits.len() > self.flags.input.addrs().count() {
            return Err(SimErr::InputTooLarge);
        }
        for (addr, d) in self.flags.input.addrs().zip(digits) {
            self.write_mem(addr, d);
        }

        match self.run_with_limit(self.flags.max_steps)? {
            Status::Halt => Ok({
                self.flags.output.addrs()
                    .filter_map(|addr| char::from_digit(u32::from(self.mem.get_raw(addr)), 16))
                    .collect()
            }),
            Status::Ok => Err(SimErr::StepLimit),
            status => Err(SimErr::NotHalted(status)),
        }
    }
}
impl Default for Machine {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

/// Shifts left by positive amounts and right (logically) by negative amounts.
fn shift(value: u8, amount: i8) -> u8 {
    let n = u32::from(amount.unsigned_abs());
    match amount >= 0 {
        true  => value.checked_shl(n).unwrap_or(0),
        false => value.checked_shr(n).unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use crate::asm::{assemble_src, Executable, MAX_ERRORS};
    use crate::ast::reg_consts::{R0, R1, R15, R2, R3};
    use crate::ast::Reg;

    use super::observer::Change;
    use super::{shift, IoRegion, Machine, Phase, SimErr, SimFlags, Status};

    fn load(src: &str) -> Machine {
        let exe = assemble_src(src, MAX_ERRORS).unwrap_or_else(|d| panic!("failed to assemble:\n{d}"));
        let mut machine = Machine::default();
        machine.load(&exe);
        machine
    }
    fn reg(n: u8) -> Reg {
        Reg::try_from(n).unwrap()
    }

    #[test]
    fn test_phase_alternation() {
        let mut m = load("halt");
        assert_eq!(m.phase(), Phase::Fetch);
        assert_eq!(m.execute(), Err(SimErr::WrongPhase));

        assert_eq!(m.fetch(), Ok(Status::Ok));
        assert_eq!(m.phase(), Phase::Execute);
        assert_eq!(m.ir(), 0x0000);
        assert_eq!(m.nr(), 4);
        assert_eq!(m.fetch(), Err(SimErr::WrongPhase));

        assert_eq!(m.execute(), Ok(Status::Halt));
        assert_eq!(m.phase(), Phase::Fetch);
        assert_eq!(m.pc(), 4);
        assert_eq!(m.instructions_run, 1);

        // Fetching after a halt resumes (with the halt of the tail).
        assert_eq!(m.step(), Ok(Status::Ok));
        assert_eq!(m.status(), Status::Ok);
        assert_eq!(m.nr(), 8);
    }

    #[test]
    fn test_status_codes() {
        let statuses = [Status::Ok, Status::Halt, Status::BadInstruction, Status::BadAlignment];
        assert_eq!(statuses.map(Status::code), [0, 1, 2, 3]);
        assert_eq!(statuses.map(Status::is_terminal), [false, false, true, true]);
    }

    #[test]
    fn test_io_region_addrs() {
        let region = IoRegion { start: 0xFE, cells: 4 };
        assert_eq!(region.addrs().collect::<Vec<_>>(), [0xFE, 0xFF, 0x00, 0x01]);

        // Oversized regions cover all of memory once.
        let region = IoRegion { start: 0x10, cells: 300 };
        let addrs: std::collections::BTreeSet<_> = region.addrs().collect();
        assert_eq!(region.addrs().count(), 256);
        assert_eq!(addrs.len(), 256);

        assert_eq!(IoRegion { start: 0, cells: 0 }.addrs().count(), 0);
    }

    #[test]
    fn test_bad_alignment() {
        let mut m = load("halt");
        m.set_pc(2);
        assert_eq!(m.fetch(), Ok(Status::BadAlignment));
        assert_eq!(m.phase(), Phase::Fetch);

        // Terminal: no progress until reset.
        assert_eq!(m.fetch(), Ok(Status::BadAlignment));
        assert_eq!(m.step_in(), Ok(Status::BadAlignment));
        assert_eq!(m.run(), Ok(Status::BadAlignment));
        assert_eq!(m.pc(), 2);

        m.reset();
        assert_eq!(m.status(), Status::Ok);
        assert_eq!(m.run(), Ok(Status::Halt));
    }

    #[test]
    fn test_bad_instruction() {
        let mut m = Machine::default();
        m.load(&Executable::from_image(vec![0, 0, 0, 1]).unwrap());

        assert_eq!(m.fetch(), Ok(Status::Ok));
        assert_eq!(m.execute(), Ok(Status::BadInstruction));
        assert_eq!(m.pc(), 0);
        assert_eq!(m.instructions_run, 0);
        assert_eq!(m.step(), Ok(Status::BadInstruction));

        let mut m = Machine::default();
        m.load(&Executable::from_image(vec![6, 1, 2, 3]).unwrap());
        assert_eq!(m.run(), Ok(Status::BadInstruction));
    }

    #[test]
    fn test_arithmetic() {
        let mut m = load("
            loadc r1 200
            loadc r2 100
            add r3 r1 r2
            sub r4 r2 r1
            mul r5 r1 r2
            addc r1 -1
            move r6 r1
            loadc r7 0x0c
            loadc r8 0x0a
            and r9 r7 r8
            or r10 r7 r8
            xor r11 r7 r8
            halt
        ");
        assert_eq!(m.run(), Ok(Status::Halt));
        assert_eq!(m.reg(R3), 44);
        assert_eq!(m.reg(reg(4)), 156);
        assert_eq!(m.reg(reg(5)), (200u8).wrapping_mul(100));
        assert_eq!(m.reg(R1), 199);
        assert_eq!(m.reg(reg(6)), 199);
        assert_eq!(m.reg(reg(9)), 0x08);
        assert_eq!(m.reg(reg(10)), 0x0e);
        assert_eq!(m.reg(reg(11)), 0x06);
    }

    #[test]
    fn test_shift() {
        assert_eq!(shift(0b0000_0011, 2), 0b0000_1100);
        assert_eq!(shift(0b1100_0000, -6), 0b0000_0011);
        assert_eq!(shift(0xFF, 8), 0);
        assert_eq!(shift(0xFF, -8), 0);
        assert_eq!(shift(0xFF, i8::MIN), 0);
        assert_eq!(shift(0x81, 0), 0x81);

        let mut m = load("
            loadc r1 0x81
            loadc r2 -1
            shift r3 r1 r2
            loadc r2 1
            shift r15 r1 r2
            halt
        ");
        assert_eq!(m.run(), Ok(Status::Halt));
        assert_eq!(m.reg(R3), 0x40);
        assert_eq!(m.reg(R15), 0x02);
    }

    #[test]
    fn test_memory() {
        let mut m = load("
            load r1 data
            loadc r2 data+1
            loadr r3 r2
            storer r1 r2
            store r3 0xff
            halt
            word data 0x12 0x34
        ");
        assert_eq!(m.run(), Ok(Status::Halt));
        assert_eq!(m.reg(R1), 0x12);
        // Byte reads are not aligned: data+1 is the low nibble of 0x12 and the high nibble of 0x34.
        assert_eq!(m.reg(R3), 0x23);
        assert_eq!(m.mem().read_byte(m.reg(R2)), 0x12);
        // Stores wrap around the end of memory.
        assert_eq!(m.mem().get_raw(0xFF), 0x2);
        assert_eq!(m.mem().get_raw(0x00), 0x3);
    }

    #[test]
    fn test_store_notifies_changed_cells() {
        let mut m = load("loadc r1 0x35\nloadc r2 0x37\nstore r1 0x80\nstore r2 0x80\nhalt");
        m.step_in().unwrap();
        m.step_in().unwrap();
        m.observer.clear();

        m.step_in().unwrap();
        let mem_changes: Vec<_> = m.observer.take_changes().into_iter()
            .filter(|c| matches!(c, Change::Mem(_)))
            .collect();
        assert_eq!(mem_changes, [Change::Mem(0x80), Change::Mem(0x81)]);

        // The high nibble is already 3, so only the low cell changes.
        m.step_in().unwrap();
        let mem_changes: Vec<_> = m.observer.take_changes().into_iter()
            .filter(|c| matches!(c, Change::Mem(_)))
            .collect();
        assert_eq!(mem_changes, [Change::Mem(0x81)]);
        assert_eq!(m.mem().read_byte(0x80), 0x37);
    }

    #[test]
    fn test_jumps() {
        // Sums 5 + 4 + 3 + 2 + 1.
        let mut m = load("
                   loadc r1 5
            loop:  add r2 r2 r1
                   addc r1 -1
                   jumpn r1 loop
                   halt
        ");
        assert_eq!(m.run(), Ok(Status::Halt));
        assert_eq!(m.reg(R2), 15);
        assert_eq!(m.instructions_run, 1 + 3 * 5 + 1);

        // Signed comparisons against r0.
        let mut m = load("
                    loadc r0 -1
                    loadc r1 -2
                    jumpl r1 less
                    halt
            less:   loadc r2 1
                    jumple r0 lesseq
                    halt
            lesseq: loadc r3 1
                    jumpe r0 end
                    halt
            end:    loadc r15 1
                    halt
        ");
        assert_eq!(m.run(), Ok(Status::Halt));
        assert_eq!([m.reg(R2), m.reg(R3), m.reg(R15)], [1, 1, 1]);

        // noop never jumps.
        let mut m = load("noop\nloadc r1 7\nhalt");
        assert_eq!(m.run(), Ok(Status::Halt));
        assert_eq!(m.reg(R1), 7);
        assert_eq!(m.reg(R0), 0);
    }

    #[test]
    fn test_run_with_limit() {
        let mut m = load("loop: jump loop");
        assert_eq!(m.run_with_limit(10), Ok(Status::Ok));
        assert_eq!(m.instructions_run, 10);
        assert_eq!(m.run_with_limit(5), Ok(Status::Ok));
        assert_eq!(m.instructions_run, 15);
    }

    #[test]
    fn test_execute_io() {
        let mut m = load("
            load r1 0xc0
            load r2 0xc2
            add r3 r1 r2
            store r3 0xe0
            halt
        ");
        let output = m.execute_io("0102\n").unwrap();
        assert_eq!(output, format!("03{}", "0".repeat(30)));

        // Each run starts from a reset.
        assert_eq!(&m.execute_io("7f01").unwrap()[..2], "80");
        assert_eq!(&m.execute_io("FF").unwrap()[..2], "ff");

        assert_eq!(m.execute_io("0g"), Err(SimErr::InvalidInput));
        assert_eq!(m.execute_io(&"0".repeat(33)), Err(SimErr::InputTooLarge));
    }

    #[test]
    fn test_execute_io_failures() {
        let mut m = load("loop: jump loop");
        m.flags = SimFlags { max_steps: 50, ..Default::default() };
        assert_eq!(m.execute_io(""), Err(SimErr::StepLimit));
        assert_eq!(m.instructions_run, 50);

        // Jumping into data.
        let mut m = load("jump data\nword data 0x00 0x01");
        assert_eq!(m.execute_io(""), Err(SimErr::NotHalted(Status::BadInstruction)));
    }

    #[test]
    fn test_observer() {
        let mut m = load("loadc r1 5\nstore r1 0x40\nhalt");
        assert!(m.observer.changed(Change::Mem(0)));
        m.observer.clear();

        let rx = m.observer.subscribe();
        m.step_in().unwrap();
        assert_eq!(m.observer.take_changes(), vec![Change::Reg(R1), Change::Pc, Change::Ir, Change::Nr]);

        m.step_in().unwrap();
        assert_eq!(m.observer.take_changes(), vec![Change::Pc, Change::Ir, Change::Nr, Change::Mem(0x41)]);
        assert!(rx.try_iter().any(|c| c == Change::Mem(0x41)));

        assert_eq!(m.active_range(), [8, 9, 10, 11]);
    }

    #[test]
    fn test_snapshot_and_reset() {
        let mut m = load("loadc r1 5\nhalt");
        m.run().unwrap();

        let state = m.snapshot();
        assert_eq!(state.regs[1], 5);
        assert_eq!(state.status, Status::Halt);
        assert_eq!(state.pc, 8);
        assert_eq!(&state.mem[..4], &[2, 1, 0, 5]);

        m.write_mem(0, 0xF);
        m.reset();
        let state = m.snapshot();
        assert_eq!(state.regs, [0; 16]);
        assert_eq!(state.status, Status::Ok);
        assert_eq!(state.instructions_run, 0);
        assert_eq!(&state.mem[..4], &[2, 1, 0, 5]);
    }

    #[test]
    fn test_load_text() {
        let mut m = Machine::default();
        m.load_text("1f1f1f1f2105  \n").unwrap();
        assert_eq!(m.image(), &[2, 1, 0, 5]);
        assert!(matches!(m.load_text("1f1f1f1f21x5"), Err(SimErr::InvalidExe(_))));
        // A failed load keeps the previous image.
        assert_eq!(m.image(), &[2, 1, 0, 5]);
    }
}
