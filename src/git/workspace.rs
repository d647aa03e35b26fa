use crate::cache::QueryKind;
use crate::error::GitResult;
use crate::git::dispatch::Dispatcher;
use crate::git::executor::CommandOutput;
use crate::git::handle::TaskHandle;
use crate::git::module::{CommandError, Module};
use crate::git::parser::Reference;
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};

/// How references from several modules are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Every distinct reference found in any module
    Union,
    /// Only references every module has
    Intersection,
}

/// Which modules know a reference and which have it checked out
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferencePresence {
    pub present_in: Vec<String>,
    pub checked_out_in: Vec<String>,
}

impl ReferencePresence {
    /// True when some modules lack the reference
    pub fn is_partial(&self, module_count: usize) -> bool {
        self.present_in.len() != module_count
    }
}

/// Equality used when combining references across modules
///
/// Branches use [`Reference::same_branch`]; tags and stashes match by
/// variant and qualified name.
pub fn same_reference(a: &Reference, b: &Reference) -> bool {
    match (a, b) {
        (Reference::Tag { qualified_name: x, .. }, Reference::Tag { qualified_name: y, .. })
        | (Reference::Stash { qualified_name: x, .. }, Reference::Stash { qualified_name: y, .. }) => {
            x == y
        }
        _ => a.same_branch(b),
    }
}

/// Combine per-module reference lists
///
/// A single list is returned as is. Order follows first appearance.
pub fn merge_references(per_module: &[&[Reference]], mode: MergeMode) -> Vec<Reference> {
    match per_module {
        [] => Vec::new(),
        [only] => only.to_vec(),
        [first, rest @ ..] => match mode {
            MergeMode::Union => {
                let mut merged: Vec<Reference> = Vec::new();
                for reference in per_module.iter().flat_map(|refs| refs.iter()) {
                    if !merged.iter().any(|m| same_reference(m, reference)) {
                        merged.push(reference.clone());
                    }
                }
                merged
            }
            MergeMode::Intersection => {
                let mut merged: Vec<Reference> = Vec::new();
                for reference in first.iter() {
                    let everywhere = rest
                        .iter()
                        .all(|refs| refs.iter().any(|r| same_reference(r, reference)));
                    if everywhere && !merged.iter().any(|m| same_reference(m, reference)) {
                        merged.push(reference.clone());
                    }
                }
                merged
            }
        },
    }
}

/// Module paths are absolute, so lookups are too
fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// The modules the host currently tracks
#[derive(Debug)]
pub struct Workspace {
    dispatcher: Dispatcher,
    modules: Vec<Module>,
}

impl Workspace {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            modules: Vec::new(),
        }
    }

    /// Discover the working tree of every path, skipping duplicates
    pub fn discover<I, P>(paths: I, dispatcher: Dispatcher) -> GitResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut workspace = Self::new(dispatcher);
        for path in paths {
            let module = Module::discover_from(path, workspace.dispatcher.clone())?;
            workspace.add(module);
        }
        Ok(workspace)
    }

    /// Track a module; returns false when its path is already tracked
    pub fn add(&mut self, module: Module) -> bool {
        if self.get(module.path()).is_some() {
            return false;
        }
        self.modules.push(module);
        true
    }

    /// Stop tracking the module at `path`
    pub fn remove(&mut self, path: &Path) -> Option<Module> {
        let path = absolute(path);
        let index = self.modules.iter().position(|m| m.path() == path)?;
        Some(self.modules.remove(index))
    }

    pub fn get(&self, path: &Path) -> Option<&Module> {
        let path = absolute(path);
        self.modules.iter().find(|m| m.path() == path)
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut Module> {
        let path = absolute(path);
        self.modules.iter_mut().find(|m| m.path() == path)
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn modules_mut(&mut self) -> &mut [Module] {
        &mut self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Run one argument string in every module
    pub fn run_all(&mut self, args: &str) -> Vec<(PathBuf, TaskHandle<CommandOutput>)> {
        self.modules
            .iter_mut()
            .map(|m| (m.path().to_path_buf(), m.run(args)))
            .collect()
    }

    /// References of all modules combined, or `None` while any module has
    /// not produced its references yet
    pub fn merged_references(&mut self, mode: MergeMode) -> Option<Vec<Reference>> {
        let entries: Vec<_> = self
            .modules
            .iter_mut()
            .map(|m| m.get(QueryKind::References))
            .collect();

        let lists = entries
            .iter()
            .map(|entry| entry.references().map(|refs| refs.as_slice()))
            .collect::<Option<Vec<&[Reference]>>>()?;

        Some(merge_references(&lists, mode))
    }

    /// Which modules have `reference`, and which are on it
    ///
    /// Reads only what is cached; modules without data count as lacking it.
    pub fn presence(&self, reference: &Reference) -> ReferencePresence {
        let mut presence = ReferencePresence::default();
        for module in &self.modules {
            let has_it = module
                .peek(QueryKind::References)
                .and_then(|e| e.references())
                .is_some_and(|refs| refs.iter().any(|r| r.qualified_name() == reference.qualified_name()));
            if has_it {
                presence.present_in.push(module.name().to_string());
            }

            let on_it = module
                .peek(QueryKind::CurrentBranch)
                .and_then(|e| e.current_branch())
                .flatten()
                .is_some_and(|branch| branch == reference.qualified_name());
            if on_it {
                presence.checked_out_in.push(module.name().to_string());
            }
        }
        presence
    }

    /// Drain command failures of every module
    pub fn take_errors(&mut self) -> Vec<(PathBuf, CommandError)> {
        self.modules
            .iter_mut()
            .flat_map(|m| {
                let path = m.path().to_path_buf();
                m.take_errors().into_iter().map(move |e| (path.clone(), e))
            })
            .collect()
    }

    pub fn is_busy(&self) -> bool {
        self.modules.iter().any(Module::is_busy)
    }

    /// Future resolving once all modules' current work has finished
    pub fn idle(&self) -> impl Future<Output = ()> + Send + 'static {
        let waits: Vec<_> = self.modules.iter().map(Module::idle).collect();
        async move {
            for wait in waits {
                wait.await;
            }
        }
    }
}
