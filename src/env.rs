// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Symbol environment for labels and aliases.

use std::collections::HashMap;
use std::io::{self, Write};

use crate::expr::EvalContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum DefineResult {
    Ok,
    Duplicate,
}

/// Mapping from symbol name to resolved (or provisional) address, with a
/// per-round change flag. Owned by exactly one pipeline run.
#[derive(Debug, Default)]
pub struct Environment {
    bindings: HashMap<String, i64>,
    changed: u32,
}

impl Environment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a fresh name. Fails if the name is already bound.
    pub fn define(&mut self, name: &str, value: i64) -> DefineResult {
        if self.bindings.contains_key(name) {
            return DefineResult::Duplicate;
        }
        self.bindings.insert(name.to_string(), value);
        self.changed += 1;
        DefineResult::Ok
    }

    /// Absence is not an error; resolution may simply be pending.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<i64> {
        self.bindings.get(name).copied()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Overwrite a binding, counting a change only when the value differs.
    /// Inserting a previously unseen name also counts as a change.
    pub fn update(&mut self, name: &str, value: i64) {
        match self.bindings.get_mut(name) {
            Some(slot) => {
                if *slot != value {
                    *slot = value;
                    self.changed += 1;
                }
            }
            None => {
                self.bindings.insert(name.to_string(), value);
                self.changed += 1;
            }
        }
    }

    /// Number of bindings changed since the last reset.
    #[must_use]
    pub fn changed(&self) -> u32 {
        self.changed
    }

    /// Reset the change counter at the start of a round.
    pub fn reset_changed(&mut self) {
        self.changed = 0;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Evaluation context over this environment, with `^` bound to `here`.
    pub fn eval_ctx(&self, here: Option<i64>) -> EnvContext<'_> {
        EnvContext { env: self, here }
    }

    pub fn dump<W: Write>(&self, mut out: W) -> io::Result<()> {
        let mut names: Vec<&String> = self.bindings.keys().collect();
        names.sort();
        for name in names {
            let val = self.bindings[name];
            writeln!(out, "{name:<16}: {val:04x} ({val})")?;
        }
        Ok(())
    }
}

pub struct EnvContext<'a> {
    env: &'a Environment,
    here: Option<i64>,
}

impl EvalContext for EnvContext<'_> {
    fn lookup(&self, name: &str) -> Option<i64> {
        self.env.get(name)
    }

    fn here(&self) -> Option<i64> {
        self.here
    }
}
