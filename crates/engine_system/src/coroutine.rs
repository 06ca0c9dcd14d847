//! Coroutines: resumable world tasks ticked once per update.
//!
//! A coroutine is a closure resumed once per coroutine tick. Each resume
//! returns a [`CoroutineState`] telling the runtime whether to resume it
//! again, let it sleep, or drop it.

use crate::error::SystemResult;
use crate::world::World;

/// What a coroutine wants after a resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineState {
    /// Resume again on the next tick.
    Yield,
    /// Skip the next `n` ticks, then resume.
    Wait(u32),
    /// Finished; drop the coroutine.
    Complete,
}

type CoroutineFn = Box<dyn FnMut(&mut World) -> SystemResult<CoroutineState> + Send>;

struct Coroutine {
    body: CoroutineFn,
    sleep: u32,
}

/// The set of running coroutines, in start order.
#[derive(Default)]
pub struct Coroutines {
    active: Vec<Coroutine>,
}

impl Coroutines {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a coroutine; it is first resumed on the next tick.
    pub fn start(
        &mut self,
        body: impl FnMut(&mut World) -> SystemResult<CoroutineState> + Send + 'static,
    ) {
        self.active.push(Coroutine {
            body: Box::new(body),
            sleep: 0,
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Move every coroutine of `other` to the end of this set.
    pub fn append(&mut self, mut other: Coroutines) {
        self.active.append(&mut other.active);
    }

    /// Resume every coroutine once, in start order.
    ///
    /// A coroutine that fails is dropped and its error returned; the ones
    /// after it are kept but not resumed this tick.
    pub fn resume_all(&mut self, world: &mut World) -> SystemResult {
        let mut pending = std::mem::take(&mut self.active).into_iter();
        let mut kept = Vec::with_capacity(pending.len());

        while let Some(mut coroutine) = pending.next() {
            if coroutine.sleep > 0 {
                coroutine.sleep -= 1;
                kept.push(coroutine);
                continue;
            }
            match (coroutine.body)(world) {
                Ok(CoroutineState::Yield) => kept.push(coroutine),
                Ok(CoroutineState::Wait(ticks)) => {
                    coroutine.sleep = ticks;
                    kept.push(coroutine);
                }
                Ok(CoroutineState::Complete) => {}
                Err(err) => {
                    kept.extend(pending);
                    self.active = kept;
                    return Err(err);
                }
            }
        }

        self.active = kept;
        Ok(())
    }
}

impl std::fmt::Debug for Coroutines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coroutines")
            .field("active", &self.active.len())
            .finish()
    }
}
