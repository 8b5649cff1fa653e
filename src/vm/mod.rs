//! The stack-based virtual machine that executes a compiled [`Program`]
//! (spec.md §4.7).
pub mod error;
pub mod object;

pub use error::RuntimeError;
pub use object::{Heap, Object, ObjectPayload};

use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::builtins::Builtin;
use crate::bytecode::value::ObjectHandle;
use crate::bytecode::{Constant, OpCode, Program, Value};
use crate::config::VmOptions;

pub type VmResult<T> = Result<T, RuntimeError>;

/// One activation record. `stack_offset` is where this call's owned region
/// of the evaluation stack begins: its parameters (placed there by `CALL`)
/// followed by its own locals (reserved by `STACK_ALLOC`).
struct CallFrame {
    return_func_index: u8,
    return_pc: usize,
    stack_offset: usize,
    root: bool,
}

pub struct Vm {
    program: Program,
    constants: Vec<Value>,
    heap: Heap,
    eval_stack: Vec<Value>,
    call_stack: Vec<CallFrame>,
    current_func: u8,
    pc: usize,
    options: VmOptions,
    rng_state: u64,
    output: Box<dyn Write>,
}

impl Vm {
    pub fn new(program: Program, options: VmOptions) -> Self {
        Self::with_writer(program, options, Box::new(std::io::stdout()))
    }

    pub fn with_writer(program: Program, options: VmOptions, output: Box<dyn Write>) -> Self {
        let mut heap = Heap::new();
        let constants = materialize_constants(&program.constants, &mut heap);
        Self {
            program,
            constants,
            heap,
            eval_stack: Vec::new(),
            call_stack: Vec::new(),
            current_func: 0,
            pc: 0,
            options,
            rng_state: seed_from_wall_clock(),
            output,
        }
    }

    /// Runs the program from function 0 (the top-level script) to
    /// completion, mandatorily sweeping the heap once the root frame
    /// returns (spec.md §4.7).
    pub fn run(&mut self) -> VmResult<()> {
        self.call_stack.push(CallFrame {
            return_func_index: 0,
            return_pc: 0,
            stack_offset: 0,
            root: true,
        });
        self.current_func = 0;
        self.pc = 0;

        loop {
            let (opcode, operand) = self.fetch()?;
            if self.dispatch(opcode, operand)? {
                break;
            }
        }

        let roots = self.eval_stack.clone();
        self.heap.collect(roots);
        Ok(())
    }

    /// Reads one instruction at `pc` and advances past it. Running off the
    /// end of a function's code (no explicit `RETURN` emitted, e.g. the
    /// top-level script's implicit fall-through, or a function body whose
    /// last statement isn't a `return`) is treated as an implicit
    /// `RETURN` with no value, not a fault.
    fn fetch(&mut self) -> VmResult<(OpCode, Option<u8>)> {
        let chunk = &self.program.functions[self.current_func as usize];
        if self.pc >= chunk.code.len() {
            return Ok((OpCode::Return, Some(0)));
        }
        let opcode = OpCode::from_byte(chunk.code[self.pc])
            .ok_or(RuntimeError::MalformedInstruction { pc: self.pc })?;
        self.pc += 1;
        let operand = if opcode.has_operand() {
            let byte = *chunk
                .code
                .get(self.pc)
                .ok_or(RuntimeError::MalformedInstruction { pc: self.pc })?;
            self.pc += 1;
            Some(byte)
        } else {
            None
        };
        Ok((opcode, operand))
    }

    /// Executes one instruction. Returns `Ok(true)` once the root frame has
    /// returned, signalling the main loop to stop.
    fn dispatch(&mut self, opcode: OpCode, operand: Option<u8>) -> VmResult<bool> {
        match opcode {
            OpCode::Constant => {
                let index = operand.unwrap();
                let value = *self
                    .constants
                    .get(index as usize)
                    .ok_or(RuntimeError::InvalidConstant { index })?;
                self.push(value)?;
            }
            OpCode::VarSet => {
                let slot = operand.unwrap();
                let value = self.pop()?;
                self.set_local(slot, value)?;
            }
            OpCode::VarGet => {
                let slot = operand.unwrap();
                let value = self.get_local(slot)?;
                self.push(value)?;
            }
            OpCode::StackAlloc => {
                for _ in 0..operand.unwrap_or(0) {
                    self.push(Value::Int(0))?;
                }
            }
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Mod => {
                self.binary_arith(opcode)?;
            }
            OpCode::Equal => {
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                let equal = self.values_equal(lhs, rhs);
                self.push(Value::Bool(equal))?;
            }
            OpCode::Less | OpCode::LessEq | OpCode::Greater | OpCode::GreaterEq => {
                self.binary_compare(opcode)?;
            }
            OpCode::And => {
                let rhs = self.pop_bool()?;
                let lhs = self.pop_bool()?;
                self.push(Value::Bool(lhs && rhs))?;
            }
            OpCode::Or => {
                let rhs = self.pop_bool()?;
                let lhs = self.pop_bool()?;
                self.push(Value::Bool(lhs || rhs))?;
            }
            OpCode::Negate => {
                let value = self.pop_bool()?;
                self.push(Value::Bool(!value))?;
            }
            OpCode::BranchNeq => {
                let distance = operand.unwrap();
                let cond = self.pop_bool()?;
                if !cond {
                    self.pc += distance as usize;
                }
            }
            OpCode::Jump => {
                self.pc += operand.unwrap() as usize;
            }
            OpCode::JumpBack => {
                self.pc -= operand.unwrap() as usize;
            }
            OpCode::Call => {
                self.do_call(operand.unwrap() as usize)?;
            }
            OpCode::Return => {
                let halt = self.do_return(operand.unwrap_or(0) != 0)?;
                return Ok(halt);
            }
            OpCode::ArrayInit => {
                let n = operand.unwrap_or(0) as usize;
                let mut items = vec![Value::Int(0); n];
                for slot in items.iter_mut() {
                    *slot = self.pop()?;
                }
                let handle = self.heap.allocate(ObjectPayload::Array(items));
                self.push(Value::Object(handle))?;
                self.maybe_collect();
            }
            OpCode::ArrayGet => {
                let array = self.pop()?;
                let index = self.pop()?;
                let value = self.array_get(array, index)?;
                self.push(value)?;
            }
            OpCode::ArraySet => {
                let array = self.pop()?;
                let index = self.pop()?;
                let value = self.pop()?;
                self.array_set(array, index, value)?;
            }
            OpCode::CallBuiltin => {
                let idx = operand.unwrap();
                let builtin = Builtin::from_index(idx)
                    .ok_or(RuntimeError::MalformedInstruction { pc: self.pc })?;
                let arity = builtin.arity();
                let mut args = vec![Value::Int(0); arity];
                for slot in args.iter_mut() {
                    *slot = self.pop()?;
                }
                args.reverse();
                let result = self.call_builtin(builtin, &args)?;
                if let Some(value) = result {
                    self.push(value)?;
                }
                self.maybe_collect();
            }
        }
        Ok(false)
    }

    fn binary_arith(&mut self, op: OpCode) -> VmResult<()> {
        let rhs = self.pop_int()?;
        let lhs = self.pop_int()?;
        let result = match op {
            OpCode::Add => lhs.wrapping_add(rhs),
            OpCode::Sub => lhs.wrapping_sub(rhs),
            OpCode::Mul => lhs.wrapping_mul(rhs),
            OpCode::Div => {
                if rhs == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                lhs.wrapping_div(rhs)
            }
            OpCode::Mod => {
                if rhs == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                lhs.wrapping_rem(rhs)
            }
            _ => unreachable!(),
        };
        self.push(Value::Int(result))
    }

    fn binary_compare(&mut self, op: OpCode) -> VmResult<()> {
        let rhs = self.pop_int()?;
        let lhs = self.pop_int()?;
        let result = match op {
            OpCode::Less => lhs < rhs,
            OpCode::LessEq => lhs <= rhs,
            OpCode::Greater => lhs > rhs,
            OpCode::GreaterEq => lhs >= rhs,
            _ => unreachable!(),
        };
        self.push(Value::Bool(result))
    }

    fn do_call(&mut self, argc: usize) -> VmResult<()> {
        let callee = self.pop()?;
        let Value::Func(index) = callee else {
            return Err(RuntimeError::MalformedInstruction { pc: self.pc });
        };
        if self.eval_stack.len() < argc {
            return Err(RuntimeError::StackUnderflow);
        }
        if self.call_stack.len() >= self.options.call_stack_cap {
            return Err(RuntimeError::StackOverflow);
        }
        let stack_offset = self.eval_stack.len() - argc;
        self.call_stack.push(CallFrame {
            return_func_index: self.current_func,
            return_pc: self.pc,
            stack_offset,
            root: false,
        });
        self.current_func = index;
        self.pc = 0;
        Ok(())
    }

    fn do_return(&mut self, has_value: bool) -> VmResult<bool> {
        let value = if has_value { Some(self.pop()?) } else { None };
        let frame = self.call_stack.pop().ok_or(RuntimeError::InvalidCallFrame)?;
        self.eval_stack.truncate(frame.stack_offset);
        if let Some(value) = value {
            self.push(value)?;
        }
        if frame.root {
            return Ok(true);
        }
        self.current_func = frame.return_func_index;
        self.pc = frame.return_pc;
        Ok(false)
    }

    fn array_get(&self, array: Value, index: Value) -> VmResult<Value> {
        let Value::Object(handle) = array else {
            return Err(RuntimeError::MalformedInstruction { pc: self.pc });
        };
        let idx = index.as_int().ok_or(RuntimeError::MalformedInstruction { pc: self.pc })?;
        let object = self.heap.get(handle).ok_or(RuntimeError::InvalidCallFrame)?;
        let ObjectPayload::Array(items) = &object.payload else {
            return Err(RuntimeError::MalformedInstruction { pc: self.pc });
        };
        if idx < 0 || idx as usize >= items.len() {
            return Err(RuntimeError::IndexOutOfBounds { index: idx, len: items.len() });
        }
        Ok(items[idx as usize])
    }

    fn array_set(&mut self, array: Value, index: Value, value: Value) -> VmResult<()> {
        let Value::Object(handle) = array else {
            return Err(RuntimeError::MalformedInstruction { pc: self.pc });
        };
        let idx = index.as_int().ok_or(RuntimeError::MalformedInstruction { pc: self.pc })?;
        let object = self.heap.get_mut(handle).ok_or(RuntimeError::InvalidCallFrame)?;
        let ObjectPayload::Array(items) = &mut object.payload else {
            return Err(RuntimeError::MalformedInstruction { pc: self.pc });
        };
        if idx < 0 || idx as usize >= items.len() {
            return Err(RuntimeError::IndexOutOfBounds { index: idx, len: items.len() });
        }
        items[idx as usize] = value;
        Ok(())
    }

    fn call_builtin(&mut self, builtin: Builtin, args: &[Value]) -> VmResult<Option<Value>> {
        match builtin {
            Builtin::Print => {
                let text = self.stringify(args[0]);
                writeln!(self.output, "{text}").map_err(|_| RuntimeError::OutputFailure)?;
                Ok(None)
            }
            Builtin::ToString => {
                let text = self.stringify(args[0]);
                let handle = self.heap.allocate(ObjectPayload::String(text));
                Ok(Some(Value::Object(handle)))
            }
            Builtin::Length => {
                let len = match args[0] {
                    Value::Object(handle) => {
                        let object = self.heap.get(handle).ok_or(RuntimeError::InvalidCallFrame)?;
                        match &object.payload {
                            ObjectPayload::String(s) => s.chars().count(),
                            ObjectPayload::Array(items) => items.len(),
                        }
                    }
                    _ => return Err(RuntimeError::MalformedInstruction { pc: self.pc }),
                };
                Ok(Some(Value::Int(len as i64)))
            }
            Builtin::Clone => Ok(Some(self.deep_clone(args[0]))),
            Builtin::Append => {
                let Value::Object(handle) = args[0] else {
                    return Err(RuntimeError::MalformedInstruction { pc: self.pc });
                };
                let elem = args[1];
                let object = self.heap.get_mut(handle).ok_or(RuntimeError::InvalidCallFrame)?;
                let ObjectPayload::Array(items) = &mut object.payload else {
                    return Err(RuntimeError::MalformedInstruction { pc: self.pc });
                };
                items.push(elem);
                Ok(None)
            }
            Builtin::Random => {
                let lo = args[0].as_int().ok_or(RuntimeError::MalformedInstruction { pc: self.pc })?;
                let hi = args[1].as_int().ok_or(RuntimeError::MalformedInstruction { pc: self.pc })?;
                Ok(Some(Value::Int(self.next_random(lo, hi))))
            }
        }
    }

    fn stringify(&self, value: Value) -> String {
        match value {
            Value::Int(v) => v.to_string(),
            Value::Bool(v) => v.to_string(),
            Value::Func(idx) => format!("<function {idx}>"),
            Value::Object(handle) => match self.heap.get(handle).map(|o| &o.payload) {
                Some(ObjectPayload::String(s)) => s.clone(),
                Some(ObjectPayload::Array(items)) => {
                    let parts: Vec<String> = items.iter().map(|v| self.stringify(*v)).collect();
                    format!("[{}]", parts.join(", "))
                }
                None => "<freed>".to_string(),
            },
        }
    }

    fn deep_clone(&mut self, value: Value) -> Value {
        match value {
            Value::Int(_) | Value::Bool(_) | Value::Func(_) => value,
            Value::Object(handle) => {
                let payload = self.heap.get(handle).map(|o| o.payload.clone());
                match payload {
                    Some(ObjectPayload::String(s)) => {
                        Value::Object(self.heap.allocate(ObjectPayload::String(s)))
                    }
                    Some(ObjectPayload::Array(items)) => {
                        let cloned: Vec<Value> = items.into_iter().map(|v| self.deep_clone(v)).collect();
                        Value::Object(self.heap.allocate(ObjectPayload::Array(cloned)))
                    }
                    None => value,
                }
            }
        }
    }

    fn values_equal(&self, a: Value, b: Value) -> bool {
        match (a, b) {
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Func(x), Value::Func(y)) => x == y,
            (Value::Object(x), Value::Object(y)) => self.objects_equal(x, y),
            _ => false,
        }
    }

    fn objects_equal(&self, x: ObjectHandle, y: ObjectHandle) -> bool {
        if x == y {
            return true;
        }
        match (self.heap.get(x), self.heap.get(y)) {
            (Some(ox), Some(oy)) => match (&ox.payload, &oy.payload) {
                (ObjectPayload::String(s1), ObjectPayload::String(s2)) => s1 == s2,
                (ObjectPayload::Array(a1), ObjectPayload::Array(a2)) => {
                    a1.len() == a2.len()
                        && a1.iter().zip(a2.iter()).all(|(v1, v2)| self.values_equal(*v1, *v2))
                }
                _ => false,
            },
            _ => false,
        }
    }

    /// Bounds are treated as inclusive on both ends; spec.md §9 leaves this
    /// undocumented in the original source (see DESIGN.md).
    fn next_random(&mut self, lo: i64, hi: i64) -> i64 {
        self.rng_state ^= self.rng_state << 13;
        self.rng_state ^= self.rng_state >> 7;
        self.rng_state ^= self.rng_state << 17;
        if hi <= lo {
            return lo;
        }
        let span = (hi - lo + 1) as u64;
        lo + (self.rng_state % span) as i64
    }

    fn maybe_collect(&mut self) {
        if self.heap.live_count() >= self.options.gc_object_threshold {
            let roots = self.eval_stack.clone();
            self.heap.collect(roots);
        }
    }

    fn local_index(&self, slot: u8) -> VmResult<usize> {
        let frame = self.call_stack.last().ok_or(RuntimeError::InvalidCallFrame)?;
        Ok(frame.stack_offset + slot as usize)
    }

    fn get_local(&self, slot: u8) -> VmResult<Value> {
        let idx = self.local_index(slot)?;
        self.eval_stack.get(idx).copied().ok_or(RuntimeError::StackUnderflow)
    }

    fn set_local(&mut self, slot: u8, value: Value) -> VmResult<()> {
        let idx = self.local_index(slot)?;
        while self.eval_stack.len() <= idx {
            self.eval_stack.push(Value::Int(0));
        }
        self.eval_stack[idx] = value;
        Ok(())
    }

    fn push(&mut self, value: Value) -> VmResult<()> {
        if self.eval_stack.len() >= self.options.eval_stack_cap {
            return Err(RuntimeError::StackOverflow);
        }
        self.eval_stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> VmResult<Value> {
        self.eval_stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    fn pop_int(&mut self) -> VmResult<i64> {
        self.pop()?.as_int().ok_or(RuntimeError::MalformedInstruction { pc: self.pc })
    }

    fn pop_bool(&mut self) -> VmResult<bool> {
        self.pop()?.as_bool().ok_or(RuntimeError::MalformedInstruction { pc: self.pc })
    }
}

fn materialize_constants(constants: &[Constant], heap: &mut Heap) -> Vec<Value> {
    constants
        .iter()
        .map(|c| match c {
            Constant::Int(v) => Value::Int(*v),
            Constant::Bool(v) => Value::Bool(*v),
            Constant::Func(idx) => Value::Func(*idx),
            Constant::Str(s) => Value::Object(heap.allocate(ObjectPayload::String(s.clone()))),
        })
        .collect()
}

fn seed_from_wall_clock() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(1);
    millis | 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Chunk;

    fn program_with(code: Vec<u8>, constants: Vec<Constant>) -> Program {
        Program { functions: vec![Chunk { code }], constants }
    }

    #[test]
    fn empty_top_level_block_returns_immediately() {
        let program = program_with(vec![OpCode::StackAlloc as u8, 0], vec![]);
        let mut vm = Vm::with_writer(program, VmOptions::default(), Box::new(Vec::new()));
        assert!(vm.run().is_ok());
    }

    #[test]
    fn arithmetic_and_print_produce_observable_output() {
        // var a := 3 + 4; print(a);
        let code = vec![
            OpCode::StackAlloc as u8,
            1,
            OpCode::Constant as u8,
            0,
            OpCode::Constant as u8,
            1,
            OpCode::Add as u8,
            OpCode::VarSet as u8,
            0,
            OpCode::VarGet as u8,
            0,
            OpCode::CallBuiltin as u8,
            Builtin::Print.index(),
        ];
        let program = program_with(code, vec![Constant::Int(3), Constant::Int(4)]);
        let output = Vec::new();
        let mut vm = Vm::with_writer(program, VmOptions::default(), Box::new(output));
        vm.run().unwrap();
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let code = vec![
            OpCode::Constant as u8,
            0,
            OpCode::Constant as u8,
            1,
            OpCode::Div as u8,
        ];
        let program = program_with(code, vec![Constant::Int(1), Constant::Int(0)]);
        let mut vm = Vm::with_writer(program, VmOptions::default(), Box::new(Vec::new()));
        assert_eq!(vm.run(), Err(RuntimeError::DivisionByZero));
    }

    #[test]
    fn array_index_out_of_bounds_is_reported() {
        // index is pushed before the array so the array ends on top, matching
        // the codegen convention used for `Expr::Index`.
        let code = vec![
            OpCode::Constant as u8,
            0,
            OpCode::ArrayInit as u8,
            0,
            OpCode::ArrayGet as u8,
        ];
        let program = program_with(code, vec![Constant::Int(0)]);
        let mut vm = Vm::with_writer(program, VmOptions::default(), Box::new(Vec::new()));
        let result = vm.run();
        assert!(matches!(result, Err(RuntimeError::IndexOutOfBounds { .. })));
    }
}
