//! Binding frames for the evaluator.
//!
//! Frames live in a flat arena owned by [`Environment`] and are referenced by
//! [`FrameId`], a generational index. Closures hold a `FrameId` for the frame they were
//! created in, and call frames point at their parent by id, so closure/frame cycles are
//! plain integers rather than reference-counted pointers. Unreachable frames are reclaimed
//! by [`Environment::collect_garbage`], which marks everything reachable from the global
//! frame plus caller-supplied roots and frees the rest. Reusing a slot bumps its
//! generation, so a stale id is reported as an error instead of silently aliasing a new
//! frame.

use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

use crate::Error;
use crate::ast::Value;
use crate::evaluator::Arity;
use crate::evaluator::intooperation::{
    IntoOperation, IntoVariadicOperation, OperationFn, with_arity_check,
};

/// Handle to one frame in an [`Environment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId {
    index: u32,
    generation: u32,
}

impl FrameId {
    /// Raw slot index, for diagnostics only.
    pub fn index(self) -> usize {
        self.index as usize
    }
}

#[derive(Debug, Default)]
struct Frame {
    bindings: HashMap<String, Value>,
    parent: Option<FrameId>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    frame: Option<Frame>,
}

/// Arena of binding frames plus the id of the global (root) frame.
#[derive(Debug)]
pub struct Environment {
    slots: Vec<Slot>,
    free: Vec<u32>,
    global: FrameId,
    /// Most frames that may be live at once
    frame_limit: usize,
}

/// Default and maximum frame limit; slot indices are `u32`.
pub const MAX_FRAMES: usize = u32::MAX as usize;

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// An environment holding a single empty global frame and no primitives.
    /// Use [`crate::evaluator::create_global_env`] for one with the primitive library.
    pub fn new() -> Self {
        let global = FrameId {
            index: 0,
            generation: 0,
        };
        Environment {
            slots: vec![Slot {
                generation: 0,
                frame: Some(Frame::default()),
            }],
            free: Vec::new(),
            global,
            frame_limit: MAX_FRAMES,
        }
    }

    /// Cap the number of simultaneously live frames (the global frame included) at
    /// `limit`, clamped to [`MAX_FRAMES`]. Allocating past it is an `EvalError`.
    pub fn with_frame_limit(mut self, limit: usize) -> Self {
        self.frame_limit = limit.min(MAX_FRAMES);
        self
    }

    pub fn global(&self) -> FrameId {
        self.global
    }

    fn alloc(&mut self, frame: Frame) -> Result<FrameId, Error> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.frame = Some(frame);
            return Ok(FrameId {
                index,
                generation: slot.generation,
            });
        }

        let exhausted = || {
            Error::EvalError(format!(
                "too many live environment frames (limit: {})",
                self.frame_limit
            ))
        };
        if self.slots.len() >= self.frame_limit {
            return Err(exhausted());
        }
        let index = u32::try_from(self.slots.len()).map_err(|_| exhausted())?;
        self.slots.push(Slot {
            generation: 0,
            frame: Some(frame),
        });
        Ok(FrameId {
            index,
            generation: 0,
        })
    }

    fn frame(&self, id: FrameId) -> Result<&Frame, Error> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.frame.as_ref())
            .ok_or_else(stale_frame)
    }

    fn frame_mut(&mut self, id: FrameId) -> Result<&mut Frame, Error> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.frame.as_mut())
            .ok_or_else(stale_frame)
    }

    /// Allocate a fresh empty frame whose parent is `parent`.
    pub fn new_child(&mut self, parent: FrameId) -> Result<FrameId, Error> {
        self.frame(parent)?;
        self.alloc(Frame {
            bindings: HashMap::new(),
            parent: Some(parent),
        })
    }

    /// Bind or rebind `name` in `frame` itself; outer frames are never touched.
    pub fn define(
        &mut self,
        frame: FrameId,
        name: impl Into<String>,
        value: Value,
    ) -> Result<(), Error> {
        self.frame_mut(frame)?.bindings.insert(name.into(), value);
        Ok(())
    }

    /// Look `name` up in `frame`, then in its ancestors.
    pub fn lookup(&self, frame: FrameId, name: &str) -> Result<Value, Error> {
        let mut current = Some(frame);
        while let Some(id) = current {
            let frame = self.frame(id)?;
            if let Some(value) = frame.bindings.get(name) {
                return Ok(value.clone());
            }
            current = frame.parent;
        }
        Err(Error::UnboundVariable(name.to_owned()))
    }

    /// Register a plain slice-based function as a primitive in the global frame.
    ///
    /// # Example
    /// ```
    /// use minischeme::evaluator::create_global_env;
    /// use minischeme::ast::Value;
    /// use minischeme::Error;
    ///
    /// fn count_args(args: &[Value]) -> Result<Value, Error> {
    ///     Ok(Value::Number(args.len() as f64))
    /// }
    ///
    /// let mut env = create_global_env();
    /// env.register_raw_primitive("count-args", count_args);
    /// ```
    pub fn register_raw_primitive(&mut self, name: &str, func: fn(&[Value]) -> Result<Value, Error>) {
        let wrapped: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| func(&args));
        self.bind_primitive(name, wrapped);
    }

    /// Register a strongly-typed Rust function as a primitive. Arguments are converted
    /// from `Value` automatically and the arity is checked against the Rust signature.
    ///
    /// Supported parameter types: `f64`, `bool`, `Value`, and the list iterators from
    /// [`crate::evaluator::intooperation`]. Return types: anything `Into<Value>`, or
    /// `Result<T, Error>` of one.
    ///
    /// ```
    /// use minischeme::evaluator::{create_global_env, eval};
    /// use minischeme::scheme::parse_scheme;
    /// use minischeme::ast::Value;
    ///
    /// fn hypot(a: f64, b: f64) -> f64 {
    ///     (a * a + b * b).sqrt()
    /// }
    ///
    /// let mut env = create_global_env();
    /// env.register_primitive::<_, (f64, f64)>("hypot", hypot);
    /// let expr = parse_scheme("(hypot 3 4)").unwrap();
    /// assert_eq!(eval(&expr, &mut env).unwrap(), Value::Number(5.0));
    /// ```
    pub fn register_primitive<F, Args>(&mut self, name: &str, func: F)
    where
        F: IntoOperation<Args>,
    {
        self.bind_primitive(name, func.into_operation());
    }

    /// Register a primitive whose last Rust parameter is a rest iterator (for example
    /// `fn(f64, NumIter<'_>) -> f64`). The total argument count is checked against `arity`
    /// before the function sees anything.
    pub fn register_variadic_primitive<F, Args>(&mut self, name: &str, arity: Arity, func: F)
    where
        F: IntoVariadicOperation<Args>,
    {
        self.bind_primitive(name, with_arity_check(arity, func.into_variadic_operation()));
    }

    pub(crate) fn bind_primitive(&mut self, name: &str, func: Arc<OperationFn>) {
        let global = self.global;
        if let Ok(frame) = self.frame_mut(global) {
            frame.bindings.insert(
                name.to_owned(),
                Value::Primitive {
                    name: name.to_owned(),
                    func,
                },
            );
        }
    }

    /// All bindings of the global frame, sorted by name
    pub fn global_bindings(&self) -> Vec<(String, Value)> {
        let mut result: Vec<(String, Value)> = self
            .frame(self.global)
            .map(|frame| {
                frame
                    .bindings
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    /// Number of frames currently allocated, the global frame included.
    pub fn live_frames(&self) -> usize {
        self.slots.iter().filter(|slot| slot.frame.is_some()).count()
    }

    /// Free every frame not reachable from the global frame or from a closure inside
    /// `roots`. Returns the number of frames freed.
    ///
    /// Takes `&mut self`, so it cannot run while an evaluation borrows the environment;
    /// callers holding closures outside the environment must pass them as roots.
    pub fn collect_garbage(&mut self, roots: &[&Value]) -> usize {
        let mut marked = vec![false; self.slots.len()];
        let mut pending: Vec<FrameId> = vec![self.global];
        for root in roots {
            collect_frame_refs(root, &mut pending);
        }

        while let Some(id) = pending.pop() {
            let Ok(frame) = self.frame(id) else {
                continue;
            };
            if std::mem::replace(&mut marked[id.index()], true) {
                continue;
            }
            if let Some(parent) = frame.parent {
                pending.push(parent);
            }
            for value in frame.bindings.values() {
                collect_frame_refs(value, &mut pending);
            }
        }

        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.frame.is_some() && !marked[index] {
                slot.frame = None;
                self.free.push(index as u32);
                freed += 1;
            }
        }

        if freed > 0 {
            debug!(
                "collected {freed} unreachable frames, {} still live",
                self.slots.len() - self.free.len()
            );
        }
        freed
    }
}

fn stale_frame() -> Error {
    Error::EvalError("stale environment frame".to_owned())
}

fn collect_frame_refs(value: &Value, out: &mut Vec<FrameId>) {
    match value {
        Value::Closure { env, body, .. } => {
            out.push(*env);
            collect_frame_refs(body, out);
        }
        Value::List(items) => {
            for item in items {
                collect_frame_refs(item, out);
            }
        }
        Value::Number(_)
        | Value::Symbol(_)
        | Value::Bool(_)
        | Value::Primitive { .. }
        | Value::Unspecified => {}
    }
}
