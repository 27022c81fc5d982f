//! Instruction builder: an insertion point over a function under
//! construction.
//!
//! New blocks are inserted before the `exit` block, preserving creation
//! order, so structured control flow (`then`/`else`/`post`,
//! `test`/`cont`/`post`) lays out the way it was declared while `exit`
//! stays last.

use crate::{AirType, Block, Function, Inst, RegId, Value};

/// Builds one function. Created positioned at `entry`; [`finish`]
/// guarantees the terminator discipline: every block ends in exactly one
/// terminator and `exit` performs the single `ret`.
///
/// [`finish`]: FunctionBuilder::finish
pub struct FunctionBuilder {
    function: Function,
    /// Index of the block instructions go into.
    current: usize,
}

impl FunctionBuilder {
    /// Start a function with its `entry` and `exit` blocks.
    pub fn new(
        name: impl Into<String>,
        params: Vec<(String, AirType)>,
        codomain: AirType,
    ) -> Self {
        let mut function = Function::new(name, params, codomain);
        function.fresh_label("entry");
        function.fresh_label("exit");
        function.blocks.push(Block::new("entry"));
        function.blocks.push(Block::new("exit"));
        Self {
            function,
            current: 0,
        }
    }

    /// The function being built (for register allocation).
    pub fn function_mut(&mut self) -> &mut Function {
        &mut self.function
    }

    /// Allocate a fresh register.
    pub fn new_reg(&mut self) -> RegId {
        self.function.new_reg()
    }

    /// Append an instruction at the insertion point. Instructions after a
    /// terminator would be unreachable; they are dropped.
    pub fn emit(&mut self, inst: Inst) {
        let block = &mut self.function.blocks[self.current];
        if !block.is_terminated() {
            block.insts.push(inst);
        }
    }

    /// Emit a value-producing instruction via a fresh destination.
    pub fn emit_into(&mut self, make: impl FnOnce(RegId) -> Inst) -> RegId {
        let dst = self.new_reg();
        self.emit(make(dst));
        dst
    }

    /// Create a block with a uniquified label, inserted before `exit`.
    /// Returns the label actually used.
    pub fn add_block(&mut self, base: &str) -> String {
        let label = self.function.fresh_label(base);
        let exit_index = self
            .function
            .blocks
            .iter()
            .position(|b| b.label == "exit")
            .expect("exit block always exists");
        self.function
            .blocks
            .insert(exit_index, Block::new(label.clone()));
        if self.current >= exit_index {
            self.current += 1;
        }
        label
    }

    /// Move the insertion point to an existing block.
    pub fn switch_to(&mut self, label: &str) {
        self.current = self
            .function
            .blocks
            .iter()
            .position(|b| b.label == label)
            .unwrap_or_else(|| panic!("no block labeled {label}"));
    }

    /// Label of the block currently being appended to.
    pub fn current_label(&self) -> &str {
        &self.function.blocks[self.current].label
    }

    /// If the current block is still open, jump to the given label.
    pub fn seal_with_jump(&mut self, label: &str) {
        self.emit(Inst::Jump {
            label: label.to_string(),
        });
    }

    /// Finish the function: the current block falls through to `exit`,
    /// `exit` rets `ret_value`, and every other open block jumps to
    /// `exit` as well.
    pub fn finish(mut self, ret_value: Option<Value>) -> Function {
        for block in &mut self.function.blocks {
            if block.label == "exit" {
                continue;
            }
            if !block.is_terminated() {
                block.insts.push(Inst::Jump {
                    label: "exit".to_string(),
                });
            }
        }
        let exit = self
            .function
            .block_mut("exit")
            .expect("exit block always exists");
        if !exit.is_terminated() {
            exit.insts.push(Inst::Ret { value: ret_value });
        }
        self.function
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AirQuals, AirTypeKind};

    fn int() -> AirType {
        AirType::new(AirQuals::Cst, AirTypeKind::Int)
    }

    #[test]
    fn every_block_ends_terminated() {
        let mut builder = FunctionBuilder::new("f", Vec::new(), AirType::nothing());
        let reg = builder.emit_into(|dst| Inst::MakeRef { dst, ty: int() });
        builder.emit(Inst::Copy {
            src: Value::Int(1),
            dst: Value::Reg(reg),
        });
        let function = builder.finish(None);
        for block in &function.blocks {
            assert!(
                block.is_terminated(),
                "block {} is not terminated",
                block.label
            );
        }
    }

    #[test]
    fn exit_holds_the_single_ret() {
        let mut builder = FunctionBuilder::new("f", Vec::new(), int());
        let ret = builder.emit_into(|dst| Inst::MakeRef { dst, ty: int() });
        let function = builder.finish(Some(Value::Reg(ret)));
        let rets: Vec<_> = function
            .blocks
            .iter()
            .flat_map(|b| &b.insts)
            .filter(|i| matches!(i, Inst::Ret { .. }))
            .collect();
        assert_eq!(rets.len(), 1);
        assert_eq!(
            function.block("exit").unwrap().insts.last(),
            Some(&Inst::Ret {
                value: Some(Value::Reg(ret))
            })
        );
    }

    #[test]
    fn blocks_insert_before_exit_in_declared_order() {
        let mut builder = FunctionBuilder::new("f", Vec::new(), AirType::nothing());
        let then = builder.add_block("then");
        let else_ = builder.add_block("else");
        let post = builder.add_block("post");
        let function = builder.finish(None);
        let labels: Vec<_> = function.blocks.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(
            labels,
            ["entry", then.as_str(), else_.as_str(), post.as_str(), "exit"]
        );
    }

    #[test]
    fn instructions_after_terminator_are_dropped() {
        let mut builder = FunctionBuilder::new("f", Vec::new(), AirType::nothing());
        builder.seal_with_jump("exit");
        builder.emit(Inst::Drop {
            value: Value::Int(0),
        });
        let function = builder.finish(None);
        assert_eq!(function.blocks[0].insts.len(), 1);
    }
}
