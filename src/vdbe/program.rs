//! Program assembly with forward-reference labels.

use crate::error::{CompileError, Result};
use crate::vdbe::opcode::{Instruction, Opcode, P4};
use std::fmt;

/// Opaque handle for a jump target that may not have an address yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(usize);

/// A finished instruction stream.
#[derive(Debug, Clone)]
pub struct Program {
    pub ops: Vec<Instruction>,
    /// Highest register number used
    pub n_mem: i32,
    /// Number of cursors used
    pub n_cursor: i32,
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "addr  opcode         p1    p2    p3    p4             p5")?;
        writeln!(f, "----  -------------  ----  ----  ----  -------------  --")?;
        for (addr, op) in self.ops.iter().enumerate() {
            writeln!(
                f,
                "{:<4}  {:<13}  {:<4}  {:<4}  {:<4}  {:<13}  {:02x}",
                addr,
                op.opcode.to_string(),
                op.p1,
                op.p2,
                op.p3,
                op.p4.to_string(),
                op.p5
            )?;
        }
        Ok(())
    }
}

/// Append-only instruction stream under construction.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    ops: Vec<Instruction>,
    /// Resolved address of each label
    labels: Vec<Option<i32>>,
    /// Instructions whose P2 waits for a label
    fixups: Vec<(usize, Label)>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address the next instruction will get.
    pub fn current_addr(&self) -> i32 {
        self.ops.len() as i32
    }

    pub fn emit_op(&mut self, opcode: Opcode, p1: i32, p2: i32, p3: i32, p4: P4, p5: u16) -> i32 {
        let addr = self.current_addr();
        self.ops.push(Instruction {
            opcode,
            p1,
            p2,
            p3,
            p4,
            p5,
        });
        addr
    }

    pub fn emit_op0(&mut self, opcode: Opcode) -> i32 {
        self.emit_op(opcode, 0, 0, 0, P4::None, 0)
    }

    pub fn emit_op1(&mut self, opcode: Opcode, p1: i32) -> i32 {
        self.emit_op(opcode, p1, 0, 0, P4::None, 0)
    }

    pub fn emit_op2(&mut self, opcode: Opcode, p1: i32, p2: i32) -> i32 {
        self.emit_op(opcode, p1, p2, 0, P4::None, 0)
    }

    pub fn emit_op3(&mut self, opcode: Opcode, p1: i32, p2: i32, p3: i32) -> i32 {
        self.emit_op(opcode, p1, p2, p3, P4::None, 0)
    }

    pub fn emit_op4(&mut self, opcode: Opcode, p1: i32, p2: i32, p3: i32, p4: P4) -> i32 {
        self.emit_op(opcode, p1, p2, p3, p4, 0)
    }

    pub fn emit_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Emit an instruction whose P2 is the address of `label`.
    pub fn emit_jump_to_label(
        &mut self,
        opcode: Opcode,
        p1: i32,
        p3: i32,
        label: Label,
        p4: P4,
        p5: u16,
    ) -> i32 {
        let target = self.labels.get(label.0).copied().flatten();
        let addr = self.emit_op(opcode, p1, target.unwrap_or(-1), p3, p4, p5);
        if target.is_none() {
            self.fixups.push((addr as usize, label));
        }
        addr
    }

    pub fn emit_goto(&mut self, label: Label) -> i32 {
        self.emit_jump_to_label(Opcode::Goto, 0, 0, label, P4::None, 0)
    }

    /// Bind `label` to the current address and patch pending jumps to it.
    pub fn resolve_label(&mut self, label: Label) {
        let addr = self.current_addr();
        if let Some(slot) = self.labels.get_mut(label.0) {
            *slot = Some(addr);
        }
        let ops = &mut self.ops;
        self.fixups.retain(|(at, l)| {
            if *l == label {
                ops[*at].p2 = addr;
                false
            } else {
                true
            }
        });
    }

    pub fn is_resolved(&self, label: Label) -> bool {
        matches!(self.labels.get(label.0), Some(Some(_)))
    }

    /// Point the P2 of the instruction at `addr` to the current address.
    pub fn jump_here(&mut self, addr: i32) {
        let here = self.current_addr();
        self.change_p2(addr, here);
    }

    pub fn op(&self, addr: i32) -> Option<&Instruction> {
        self.ops.get(addr as usize)
    }

    pub fn last_op(&self) -> Option<&Instruction> {
        self.ops.last()
    }

    pub fn change_p1(&mut self, addr: i32, p1: i32) {
        if let Some(op) = self.ops.get_mut(addr as usize) {
            op.p1 = p1;
        }
    }

    pub fn change_p2(&mut self, addr: i32, p2: i32) {
        if let Some(op) = self.ops.get_mut(addr as usize) {
            op.p2 = p2;
        }
    }

    pub fn change_p3(&mut self, addr: i32, p3: i32) {
        if let Some(op) = self.ops.get_mut(addr as usize) {
            op.p3 = p3;
        }
    }

    pub fn change_p5(&mut self, addr: i32, p5: u16) {
        if let Some(op) = self.ops.get_mut(addr as usize) {
            op.p5 = p5;
        }
    }

    /// Turn the instruction at `addr` into a no-op.
    pub fn change_to_noop(&mut self, addr: i32) {
        if let Some(op) = self.ops.get_mut(addr as usize) {
            *op = Instruction::new(Opcode::Noop, 0, 0, 0);
        }
    }

    pub fn build(self, n_mem: i32, n_cursor: i32) -> Result<Program> {
        if let Some((addr, label)) = self.fixups.first() {
            return Err(CompileError::Internal(format!(
                "unresolved label {:?} at address {}",
                label, addr
            )));
        }
        Ok(Program {
            ops: self.ops,
            n_mem,
            n_cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_label() -> Result<()> {
        let mut b = ProgramBuilder::new();
        let end = b.emit_label();
        let jump = b.emit_goto(end);
        b.emit_op2(Opcode::Integer, 1, 1);
        b.resolve_label(end);
        b.emit_op0(Opcode::Halt);
        let program = b.build(1, 0)?;
        assert_eq!(program.ops[jump as usize].p2, 2);
        Ok(())
    }

    #[test]
    fn test_backward_label() -> Result<()> {
        let mut b = ProgramBuilder::new();
        let top = b.emit_label();
        b.resolve_label(top);
        b.emit_op2(Opcode::Integer, 1, 1);
        let jump = b.emit_goto(top);
        let program = b.build(1, 0)?;
        assert_eq!(program.ops[jump as usize].p2, 0);
        Ok(())
    }

    #[test]
    fn test_unresolved_label() {
        let mut b = ProgramBuilder::new();
        let never = b.emit_label();
        b.emit_goto(never);
        assert!(matches!(b.build(0, 0), Err(CompileError::Internal(_))));
    }

    #[test]
    fn test_jump_here_and_noop() -> Result<()> {
        let mut b = ProgramBuilder::new();
        let once = b.emit_op1(Opcode::Once, 0);
        b.emit_op2(Opcode::Integer, 7, 1);
        b.jump_here(once);
        b.change_to_noop(1);
        let program = b.build(1, 0)?;
        assert_eq!(program.ops[0].p2, 2);
        assert_eq!(program.ops[1].opcode, Opcode::Noop);
        assert!(program.to_string().contains("Once"));
        Ok(())
    }
}
