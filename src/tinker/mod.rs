//! Tinker registry & pipeline (C5), spec §4.5: a polymorphic capability
//! set mutating the environment and argv of a launch through a strict
//! three-phase pipeline.

mod builtin;

pub use builtin::default_registry;

use crate::config::GameConfig;
use crate::error::TinkerError;
use crate::steam::AppId;
use std::collections::HashMap;
use std::path::PathBuf;

/// Per-launch, read-only state shared by every tinker. Mutable outputs
/// flow through `EnvMap`/`ArgVec`, never through `Context` itself.
pub struct Context<'a> {
    pub app_id: AppId,
    pub game_name: String,
    pub install_dir: PathBuf,
    pub prefix_path: PathBuf,
    pub scratch_dir: PathBuf,
    pub config_dir: PathBuf,
    pub config: &'a GameConfig,
}

/// The environment map a launch will spawn with. Backed by a `HashMap`
/// because env var order has no spawn-time meaning (spec §4.6 step 4).
#[derive(Debug, Clone, Default)]
pub struct EnvMap(HashMap<String, String>);

impl EnvMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from the invoker's own environment (spec §4.6 step 4).
    pub fn from_current_env() -> Self {
        Self(std::env::vars().collect())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// The argv vector a launch will spawn with. `argv[0]` is the program.
/// Outer wrappers (e.g. a compositor) push their own program and args to
/// the *front* during `modify_argv` (spec §4.5).
#[derive(Debug, Clone, Default)]
pub struct ArgVec(Vec<String>);

impl ArgVec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(v: Vec<String>) -> Self {
        Self(v)
    }

    pub fn push(&mut self, arg: impl Into<String>) {
        self.0.push(arg.into());
    }

    pub fn extend(&mut self, args: impl IntoIterator<Item = String>) {
        self.0.extend(args);
    }

    /// Prepend `parts` so they become the new front of the vector, in
    /// order — used by wrapping tinkers to wrap the command outermost.
    pub fn push_front(&mut self, parts: impl IntoIterator<Item = String>) {
        let mut new_front: Vec<String> = parts.into_iter().collect();
        new_front.append(&mut self.0);
        self.0 = new_front;
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The tinker capability set (spec §4.5). `id` must be stable across
/// versions since `GameConfig::tinker_settings` keys on it.
pub trait Tinker: Send + Sync {
    fn id(&self) -> &str;

    /// Smaller runs earlier; ties broken by registration order.
    fn priority(&self) -> i32;

    fn applicable(&self, ctx: &Context) -> bool;

    fn prepare(&self, ctx: &Context) -> Result<(), TinkerError> {
        let _ = ctx;
        Ok(())
    }

    fn modify_env(&self, ctx: &Context, env: &mut EnvMap) -> Result<(), TinkerError> {
        let _ = (ctx, env);
        Ok(())
    }

    fn modify_argv(&self, ctx: &Context, argv: &mut ArgVec) -> Result<(), TinkerError> {
        let _ = (ctx, argv);
        Ok(())
    }
}

/// An ordered collection of tinkers, initialized at startup with the
/// built-ins (spec §4.5) and run through the three-phase protocol.
pub struct Registry {
    tinkers: Vec<Box<dyn Tinker>>,
}

impl Registry {
    pub fn new(tinkers: Vec<Box<dyn Tinker>>) -> Self {
        Self { tinkers }
    }

    pub fn len(&self) -> usize {
        self.tinkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tinkers.is_empty()
    }

    /// Run the pipeline: all `prepare` in priority order, then all
    /// `modify_env`, then all `modify_argv` — over the same
    /// applicability-filtered, priority-sorted list in all three phases
    /// (spec §4.5). A `Fatal` error short-circuits and is returned; a
    /// `Warn` error is logged and the pipeline continues. Tinkers never
    /// observe each other's errors.
    pub fn run(&self, ctx: &Context, env: &mut EnvMap, argv: &mut ArgVec) -> Result<Vec<TinkerError>, TinkerError> {
        let mut active: Vec<&Box<dyn Tinker>> = self.tinkers.iter().filter(|t| t.applicable(ctx)).collect();
        active.sort_by_key(|t| t.priority());

        let mut warnings = Vec::new();

        for t in &active {
            if let Err(e) = t.prepare(ctx) {
                handle(e, &mut warnings)?;
            }
        }
        for t in &active {
            if let Err(e) = t.modify_env(ctx, env) {
                handle(e, &mut warnings)?;
            }
        }
        for t in &active {
            if let Err(e) = t.modify_argv(ctx, argv) {
                handle(e, &mut warnings)?;
            }
        }

        Ok(warnings)
    }
}

fn handle(e: TinkerError, warnings: &mut Vec<TinkerError>) -> Result<(), TinkerError> {
    if e.is_fatal() {
        return Err(e);
    }
    tracing::warn!("{e}");
    warnings.push(e);
    Ok(())
}
