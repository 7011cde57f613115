//! Interpreter backend.
//!
//! Executes a [`DispatchProgram`] directly. The typed half of every hook call
//! lives in an [`Invoker`] bound through a [`HookTable`]: it reads its
//! arguments from a [`Frame`] filled by the program's marshalling operations,
//! calls the method and boxes the return value. Everything else (name
//! matching, argument presence, by-reference write-back, the handled flag)
//! is driven by the operations.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut table = HookTable::new();
//! table.bind(&on_chat, |p: &mut Greeter, f| {
//!     p.on_chat(f.arg::<String>(0)?);
//!     Ok(None)
//! });
//! let dispatcher = Dispatcher::new(program, table)?;
//!
//! let mut result = None;
//! let handled = dispatcher.call(&mut greeter, Some("OnChat"), &mut result, &mut args)?;
//! ```

use crate::{collect::MethodId, program::DispatchProgram, ops::Operation};
use hookwire_core::{
    DirectCallHook, GeneratorError, HookSignature, MarshalError, MethodDescriptor, Object,
    downcast, into_object, object_at, unbox,
};
use smallvec::SmallVec;
use std::{any::Any, collections::HashMap, fmt, sync::Arc};

/// The typed half of one hook call.
pub type Invoker<T> =
    Arc<dyn Fn(&mut T, &mut Frame<'_>) -> Result<Option<Object>, MarshalError> + Send + Sync>;

/// A value pushed for the next [`Operation::Call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Arg(usize),
    Temp { slot: usize, mutable: bool },
}

#[derive(Clone)]
struct TempSlot {
    index: usize,
    value: Object,
}

/// Arguments of one hook call, in parameter order.
pub struct Frame<'a> {
    args: &'a [Object],
    operands: &'a [Operand],
    temps: &'a mut [Option<TempSlot>],
}

impl Frame<'_> {
    /// Number of arguments the call received.
    pub fn len(&self) -> usize {
        self.operands.len()
    }

    /// Whether the call takes no arguments.
    pub fn is_empty(&self) -> bool {
        self.operands.is_empty()
    }

    /// Unbox parameter `n`.
    ///
    /// By-reference parameters read the value of their temporary.
    pub fn arg<A: Any + Clone>(&self, n: usize) -> Result<A, MarshalError> {
        match self.operand(n)? {
            Operand::Arg(index) => unbox(self.args, index),
            Operand::Temp { slot, .. } => {
                let temp = self.temp(slot, n)?;
                downcast::<A>(&temp.value)
                    .cloned()
                    .ok_or(MarshalError::ArgumentType {
                        index: temp.index,
                        expected: std::any::type_name::<A>(),
                    })
            }
        }
    }

    /// Parameter `n` as an erased object, without unboxing.
    pub fn object(&self, n: usize) -> Result<Object, MarshalError> {
        match self.operand(n)? {
            Operand::Arg(index) => object_at(self.args, index),
            Operand::Temp { slot, .. } => Ok(self.temp(slot, n)?.value.clone()),
        }
    }

    /// Store the final value of a by-reference parameter.
    ///
    /// Fails with [`MarshalError::NotByRef`] when parameter `n` is not a
    /// mutable reference.
    pub fn write_back<A: Any + Send + Sync>(
        &mut self,
        n: usize,
        value: A,
    ) -> Result<(), MarshalError> {
        self.write_back_object(n, into_object(value))
    }

    /// Store the final value of a by-reference parameter of the erased type.
    pub fn write_back_object(&mut self, n: usize, value: Object) -> Result<(), MarshalError> {
        let Operand::Temp {
            slot,
            mutable: true,
        } = self.operand(n)?
        else {
            return Err(MarshalError::NotByRef(n));
        };
        let len = self.operands.len();
        let temp = self
            .temps
            .get_mut(slot)
            .and_then(Option::as_mut)
            .ok_or(MarshalError::MissingArgument { index: n, len })?;
        temp.value = value;
        Ok(())
    }

    fn operand(&self, n: usize) -> Result<Operand, MarshalError> {
        self.operands
            .get(n)
            .copied()
            .ok_or(MarshalError::MissingArgument {
                index: n,
                len: self.operands.len(),
            })
    }

    fn temp(&self, slot: usize, n: usize) -> Result<&TempSlot, MarshalError> {
        self.temps
            .get(slot)
            .and_then(Option::as_ref)
            .ok_or(MarshalError::MissingArgument {
                index: n,
                len: self.operands.len(),
            })
    }
}

/// Invokers keyed by hook signature.
pub struct HookTable<T> {
    invokers: HashMap<HookSignature, Invoker<T>>,
}

impl<T> Default for HookTable<T> {
    fn default() -> Self {
        Self {
            invokers: HashMap::new(),
        }
    }
}

impl<T> Clone for HookTable<T> {
    fn clone(&self) -> Self {
        Self {
            invokers: self.invokers.clone(),
        }
    }
}

impl<T> fmt::Debug for HookTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookTable")
            .field("hooks", &self.invokers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<T> HookTable<T> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the invoker of `method`.
    ///
    /// A later binding for the same signature replaces the earlier one.
    ///
    /// The invoker owns the typed call, including by-reference parameters:
    /// it reads them with [`Frame::arg`] and must hand the final value back
    /// with [`Frame::write_back`]. A by-reference argument the invoker never
    /// writes back keeps its original value.
    pub fn bind<F>(&mut self, method: &MethodDescriptor, invoker: F) -> &mut Self
    where
        F: Fn(&mut T, &mut Frame<'_>) -> Result<Option<Object>, MarshalError>
            + Send
            + Sync
            + 'static,
    {
        self.invokers
            .insert(HookSignature::of(method), Arc::new(invoker));
        self
    }

    /// Number of bound invokers.
    pub fn len(&self) -> usize {
        self.invokers.len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.invokers.is_empty()
    }

    fn get(&self, signature: &HookSignature) -> Option<&Invoker<T>> {
        self.invokers.get(signature)
    }
}

/// Counters of one dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecStats {
    /// Operations executed.
    pub steps: usize,
    /// Code unit and whole-name comparisons.
    pub compares: usize,
    /// One past the furthest byte of the name that was inspected.
    pub inspected: usize,
}

/// Executes a dispatch program against plugin instances of type `T`.
///
/// Holds no per-call state, so one dispatcher can serve many threads.
pub struct Dispatcher<T> {
    program: DispatchProgram,
    invokers: Vec<Invoker<T>>,
}

impl<T> fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("type_name", &self.program.type_name())
            .field("ops", &self.program.len())
            .field("hooks", &self.invokers.len())
            .finish()
    }
}

impl<T> Dispatcher<T> {
    /// Pair a program with the invokers of every hook it calls.
    pub fn new(program: DispatchProgram, table: HookTable<T>) -> Result<Self, GeneratorError> {
        let invokers = program
            .hooks()
            .iter()
            .map(|(signature, _)| {
                table
                    .get(signature)
                    .cloned()
                    .ok_or_else(|| GeneratorError::UnboundHook(signature.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { program, invokers })
    }

    /// The executed program.
    pub fn program(&self) -> &DispatchProgram {
        &self.program
    }

    /// Invoke the hook named `name` on `target`.
    ///
    /// Returns `Ok(false)` with `result` cleared when no hook matches.
    pub fn call(
        &self,
        target: &mut T,
        name: Option<&str>,
        result: &mut Option<Object>,
        args: &mut [Object],
    ) -> Result<bool, MarshalError> {
        let mut stats = ExecStats::default();
        self.run(target, name, result, args, &mut stats)
    }

    /// Like [`call`](Self::call), also reporting execution counters.
    pub fn call_with_stats(
        &self,
        target: &mut T,
        name: Option<&str>,
        result: &mut Option<Object>,
        args: &mut [Object],
    ) -> Result<(bool, ExecStats), MarshalError> {
        let mut stats = ExecStats::default();
        let handled = self.run(target, name, result, args, &mut stats)?;
        Ok((handled, stats))
    }

    fn run(
        &self,
        target: &mut T,
        name: Option<&str>,
        result: &mut Option<Object>,
        args: &mut [Object],
        stats: &mut ExecStats,
    ) -> Result<bool, MarshalError> {
        let ops = self.program.ops();
        let input = name.unwrap_or_default().as_bytes();

        let mut length = 0usize;
        let mut position = 0usize;
        let mut loaded: Option<u8> = None;
        let mut flag = false;
        let mut handled = false;
        let mut operands: SmallVec<[Operand; 4]> = SmallVec::new();
        let mut temps: SmallVec<[Option<TempSlot>; 2]> =
            SmallVec::from_elem(None, self.program.temp_count());
        let mut returned: Option<Object> = None;

        let mut pc = 0usize;
        while let Some(op) = ops.get(pc) {
            stats.steps += 1;
            pc += 1;

            match op {
                Operation::ClearResult => *result = None,
                Operation::BranchIfNameEmpty(l) => {
                    if input.is_empty() {
                        pc = l.index();
                    }
                }
                Operation::InitCursor => {
                    length = input.len();
                    position = 0;
                }
                Operation::BranchIfGreaterOrEqual(l) => {
                    if position >= length {
                        pc = l.index();
                    }
                }
                Operation::BranchIfLess(l) => {
                    if position < length {
                        pc = l.index();
                    }
                }
                Operation::LoadInputChar => {
                    loaded = input.get(position).copied();
                    stats.inspected = stats.inspected.max(position + 1);
                }
                Operation::CompareEqual(byte) => {
                    stats.compares += 1;
                    flag = loaded == Some(*byte);
                }
                Operation::CompareName(key) => {
                    stats.compares += 1;
                    flag = input == key.as_bytes();
                    if input.len() == key.len() {
                        stats.inspected = stats.inspected.max(length);
                    }
                }
                Operation::BranchIfNotEqual(l) => {
                    if !flag {
                        pc = l.index();
                    }
                }
                Operation::Advance => position += 1,
                Operation::UnboxArg { index, .. } => {
                    check_present(args, *index)?;
                    operands.push(Operand::Arg(*index));
                }
                Operation::UnboxToTemp { index, temp, .. } => {
                    check_present(args, *index)?;
                    let slot = temps
                        .get_mut(temp.index())
                        .ok_or(MarshalError::MissingArgument {
                            index: *index,
                            len: args.len(),
                        })?;
                    *slot = Some(TempSlot {
                        index: *index,
                        value: args[*index].clone(),
                    });
                }
                Operation::LoadTempAddress { temp, mutable } => {
                    operands.push(Operand::Temp {
                        slot: temp.index(),
                        mutable: *mutable,
                    });
                }
                Operation::Call(method) => {
                    let mut frame = Frame {
                        args: &*args,
                        operands: operands.as_slice(),
                        temps: temps.as_mut_slice(),
                    };
                    returned = self.invoke(*method, target, &mut frame)?;
                    operands.clear();
                }
                Operation::BoxAndStoreIndirect { .. } => *result = returned.take(),
                Operation::BoxAndStoreElement { index, temp, .. } => {
                    if let Some(Some(slot)) = temps.get_mut(temp.index()).map(Option::take) {
                        if let Some(arg) = args.get_mut(*index) {
                            *arg = slot.value;
                        }
                    }
                }
                Operation::LoadConst(value) => handled = *value,
                Operation::Return => return Ok(handled),
            }
        }

        Ok(false)
    }

    fn invoke(
        &self,
        method: MethodId,
        target: &mut T,
        frame: &mut Frame<'_>,
    ) -> Result<Option<Object>, MarshalError> {
        match self.invokers.get(method.index()) {
            Some(invoker) => invoker(target, frame),
            None => Ok(None),
        }
    }
}

fn check_present(args: &[Object], index: usize) -> Result<(), MarshalError> {
    if index < args.len() {
        Ok(())
    } else {
        Err(MarshalError::MissingArgument {
            index,
            len: args.len(),
        })
    }
}

/// A plugin instance paired with its type's dispatcher.
pub struct Hosted<T> {
    plugin: T,
    dispatcher: Arc<Dispatcher<T>>,
}

impl<T> Hosted<T> {
    /// Host `plugin` behind a shared dispatcher.
    pub fn new(plugin: T, dispatcher: Arc<Dispatcher<T>>) -> Self {
        Self { plugin, dispatcher }
    }

    /// Borrow the plugin.
    pub fn plugin(&self) -> &T {
        &self.plugin
    }

    /// Mutably borrow the plugin.
    pub fn plugin_mut(&mut self) -> &mut T {
        &mut self.plugin
    }

    /// The shared dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher<T>> {
        &self.dispatcher
    }

    /// Unwrap the plugin.
    pub fn into_inner(self) -> T {
        self.plugin
    }
}

impl<T> DirectCallHook for Hosted<T> {
    fn direct_call_hook(
        &mut self,
        name: Option<&str>,
        result: &mut Option<Object>,
        args: &mut [Object],
    ) -> Result<bool, MarshalError> {
        self.dispatcher.call(&mut self.plugin, name, result, args)
    }
}
