//! Stack safety for the recursive parts of the parser and interpreter.
//!
//! Deeply nested source or deep (but bounded) recursion in a script can need
//! more native stack than the calling thread has, for example the 2 MB of a
//! spawned test thread. Recursive steps run through [`ensure_sufficient_stack`],
//! which moves onto a freshly allocated segment when the current one runs low,
//! so the language-level limits (`Expression nesting too deep.`,
//! `Stack overflow.`) are always reached first.

// grow when less than this remains
const RED_ZONE: usize = 100 * 1024;

// size of each newly allocated segment
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
