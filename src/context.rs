//! Per-call resolution state
//!
//! A [`ResolutionContext`] is created for every top-level `make`/`call` and
//! lives on that call's stack. It carries the build stack (what is being
//! constructed right now), the parameter override frames and the resolve
//! chain used for cycle detection. Nothing here is ever stored inside the
//! container, so concurrent resolutions never see each other's frames.
//!
//! Every push returns a guard that pops on drop, which keeps the stacks
//! balanced on every exit path, including `?` returns and panics.

use crate::parameters::{Instance, Parameters, Value};
use crate::{Container, ContainerError, Injectable, Result};
use std::cell::RefCell;
use std::sync::Arc;

/// What kind of construction a build-stack frame stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
    /// A class built from its descriptor
    Class,
    /// A factory closure registered for an identifier
    Factory,
    /// A method invoked through `call`
    Call,
}

#[derive(Debug, Clone)]
struct Frame {
    name: String,
    kind: FrameKind,
}

#[derive(Default)]
struct ContextState {
    build_stack: Vec<Frame>,
    overrides: Vec<Parameters>,
    resolving: Vec<Entry>,
}

/// One `resolve` in progress. A contextual entry may see its identifier
/// again further down, since the nested resolve runs under another build
/// target and takes the plain binding.
#[derive(Debug, Clone)]
struct Entry {
    id: String,
    contextual: bool,
}

/// Request-local resolution state.
pub struct ResolutionContext {
    state: RefCell<ContextState>,
    epoch: u64,
    max_depth: usize,
}

impl ResolutionContext {
    pub(crate) fn new(epoch: u64, max_depth: usize) -> Self {
        Self {
            state: RefCell::new(ContextState::default()),
            epoch,
            max_depth,
        }
    }

    /// Scope epoch observed when this resolution started.
    #[inline]
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Enter `resolve` for `id`. Fails if a non-contextual resolve of `id`
    /// is already in progress further up this call tree or the nesting limit
    /// is reached.
    pub(crate) fn enter_resolve(&self, id: &str) -> Result<ResolvingGuard<'_>> {
        let mut state = self.state.borrow_mut();

        if state.resolving.iter().any(|e| e.id == id && !e.contextual) {
            let mut chain: Vec<String> = state.resolving.iter().map(|e| e.id.clone()).collect();
            chain.push(id.to_string());
            return Err(ContainerError::CircularDependency { chain });
        }

        if state.resolving.len() >= self.max_depth {
            let build_stack = state.build_stack.iter().map(|f| f.name.clone()).collect();
            return Err(ContainerError::binding_resolution(
                format!(
                    "Maximum resolution depth of {} exceeded while resolving [{id}]",
                    self.max_depth
                ),
                build_stack,
            ));
        }

        state.resolving.push(Entry {
            id: id.to_string(),
            contextual: false,
        });
        Ok(ResolvingGuard { context: self })
    }

    /// Record that the innermost resolve is served by a contextual binding.
    pub(crate) fn mark_contextual(&self) {
        if let Some(entry) = self.state.borrow_mut().resolving.last_mut() {
            entry.contextual = true;
        }
    }

    /// Push a build-stack frame. A class that is already under construction
    /// in this call tree cannot be pushed again.
    pub(crate) fn push_frame(&self, name: &str, kind: FrameKind) -> Result<FrameGuard<'_>> {
        let mut state = self.state.borrow_mut();

        if kind == FrameKind::Class
            && state
                .build_stack
                .iter()
                .any(|f| f.kind == FrameKind::Class && f.name == name)
        {
            let mut chain: Vec<String> = state.build_stack.iter().map(|f| f.name.clone()).collect();
            chain.push(name.to_string());
            return Err(ContainerError::CircularDependency { chain });
        }

        state.build_stack.push(Frame {
            name: name.to_string(),
            kind,
        });
        Ok(FrameGuard { context: self })
    }

    /// Push the override frame for one `resolve` invocation.
    pub(crate) fn push_overrides(&self, overrides: Parameters) -> OverrideGuard<'_> {
        self.state.borrow_mut().overrides.push(overrides);
        OverrideGuard { context: self }
    }

    /// Name of the innermost frame on the build stack.
    pub(crate) fn top_frame(&self) -> Option<String> {
        self.state.borrow().build_stack.last().map(|f| f.name.clone())
    }

    pub(crate) fn build_stack(&self) -> Vec<String> {
        self.state
            .borrow()
            .build_stack
            .iter()
            .map(|f| f.name.clone())
            .collect()
    }

    /// A copy of the topmost override frame (empty when there is none).
    pub(crate) fn current_overrides(&self) -> Parameters {
        self.state
            .borrow()
            .overrides
            .last()
            .cloned()
            .unwrap_or_default()
    }

    /// Look up `name` in the topmost override frame only.
    pub(crate) fn override_for(&self, name: &str) -> Option<Value> {
        self.state
            .borrow()
            .overrides
            .last()
            .and_then(|frame| frame.get(name).cloned())
    }

    #[cfg(test)]
    fn depths(&self) -> (usize, usize, usize) {
        let state = self.state.borrow();
        (
            state.build_stack.len(),
            state.overrides.len(),
            state.resolving.len(),
        )
    }
}

impl std::fmt::Debug for ResolutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ResolutionContext")
            .field("build_stack", &state.build_stack)
            .field("override_frames", &state.overrides.len())
            .field("resolving", &state.resolving)
            .field("epoch", &self.epoch)
            .finish()
    }
}

/// Pops the resolve chain on drop.
pub(crate) struct ResolvingGuard<'a> {
    context: &'a ResolutionContext,
}

impl Drop for ResolvingGuard<'_> {
    fn drop(&mut self) {
        self.context.state.borrow_mut().resolving.pop();
    }
}

/// Pops the build stack on drop.
pub(crate) struct FrameGuard<'a> {
    context: &'a ResolutionContext,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.context.state.borrow_mut().build_stack.pop();
    }
}

/// Pops the override frame on drop.
pub(crate) struct OverrideGuard<'a> {
    context: &'a ResolutionContext,
}

impl Drop for OverrideGuard<'_> {
    fn drop(&mut self) {
        self.context.state.borrow_mut().overrides.pop();
    }
}

/// The handle factories, extenders and hooks receive.
///
/// Resolving through a `Resolver` keeps nested resolutions inside the same
/// call tree, so contextual bindings see the right build target and cycles
/// are caught. Calling the [`Container`] directly from inside a factory
/// starts an unrelated resolution instead.
#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    container: &'a Container,
    context: &'a ResolutionContext,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(container: &'a Container, context: &'a ResolutionContext) -> Self {
        Self { container, context }
    }

    #[inline]
    pub fn container(&self) -> &'a Container {
        self.container
    }

    #[inline]
    pub(crate) fn context(&self) -> &'a ResolutionContext {
        self.context
    }

    /// Resolve `id` within the current call tree.
    #[inline]
    pub fn make(&self, id: &str) -> Result<Instance> {
        self.make_with(id, Parameters::new())
    }

    /// Resolve `id` with parameter overrides within the current call tree.
    #[inline]
    pub fn make_with(&self, id: &str, overrides: Parameters) -> Result<Instance> {
        self.container.resolve_in(self.context, id, overrides, true)
    }

    /// Resolve `id` and downcast it.
    pub fn make_as<T: Injectable>(&self, id: &str) -> Result<Arc<T>> {
        crate::parameters::downcast(id, self.make(id)?)
    }

    /// Resolve every identifier tagged with `tag`.
    pub fn tagged(&self, tag: &str) -> Result<Vec<Instance>> {
        self.container.tagged_in(self.context, tag)
    }

    /// The identifiers currently under construction, outermost first.
    pub fn build_stack(&self) -> Vec<String> {
        self.context.build_stack()
    }

    /// The override frame of the resolution currently in progress.
    pub fn parameters(&self) -> Parameters {
        self.context.current_overrides()
    }
}

impl std::fmt::Debug for Resolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("context", self.context)
            .finish()
    }
}
