//! Test utilities shared across module tests
//!
//! In-memory stand-ins for recipe sources and build hooks, plus
//! constructors for small recipe fixtures.

pub mod recipes {
    use std::collections::BTreeMap;

    use crate::core::recipe::{BuildRule, BuildStep, Recipe, RecipeMetadata, RecipeSource};
    use crate::error::RecipeError;

    /// Recipe source backed by a map, keyed by package name
    #[derive(Debug, Default)]
    pub struct MemoryRecipeSource {
        recipes: BTreeMap<String, Recipe>,
    }

    impl MemoryRecipeSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&mut self, recipe: Recipe) {
            self.recipes.insert(recipe.package.name.clone(), recipe);
        }
    }

    impl RecipeSource for MemoryRecipeSource {
        fn load(&self, name: &str) -> Result<Recipe, RecipeError> {
            self.recipes
                .get(name)
                .cloned()
                .ok_or_else(|| RecipeError::NotFound {
                    name: name.to_string(),
                })
        }

        fn available(&self) -> Vec<String> {
            self.recipes.keys().cloned().collect()
        }
    }

    /// Recipe with one ungated build rule and no dependencies.
    pub fn recipe(name: &str, version: &str) -> Recipe {
        recipe_with_deps(name, version, &[])
    }

    /// Recipe with one ungated build rule and declared dependencies.
    pub fn recipe_with_deps(name: &str, version: &str, depends: &[&str]) -> Recipe {
        Recipe {
            package: RecipeMetadata {
                name: name.to_string(),
                version: version.to_string(),
                description: None,
                depends: depends.iter().map(ToString::to_string).collect(),
                variants: BTreeMap::new(),
            },
            build: vec![BuildRule {
                when: None,
                steps: vec![BuildStep {
                    run: "true".to_string(),
                    args: Vec::new(),
                }],
            }],
        }
    }
}

pub mod hooks {
    use std::sync::Mutex;

    use crate::core::hook::{BuildContext, BuildHook};
    use crate::error::FailureCause;

    /// Hook that records every invocation instead of running commands
    #[derive(Debug, Default)]
    pub struct RecordingHook {
        invocations: Mutex<Vec<BuildContext>>,
        fail_names: Vec<String>,
    }

    impl RecordingHook {
        pub fn new() -> Self {
            Self::default()
        }

        /// Hook that fails for the named packages and succeeds otherwise.
        pub fn failing(names: &[&str]) -> Self {
            Self {
                invocations: Mutex::new(Vec::new()),
                fail_names: names.iter().map(ToString::to_string).collect(),
            }
        }

        /// Specs the hook ran for, in invocation order.
        pub fn calls(&self) -> Vec<String> {
            self.invocations
                .lock()
                .unwrap()
                .iter()
                .map(|ctx| ctx.spec.to_string())
                .collect()
        }

        /// Contexts the hook ran with, in invocation order.
        pub fn contexts(&self) -> Vec<BuildContext> {
            self.invocations.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl BuildHook for RecordingHook {
        async fn run(&self, ctx: &BuildContext) -> Result<(), FailureCause> {
            self.invocations.lock().unwrap().push(ctx.clone());
            if self.fail_names.iter().any(|name| name == ctx.spec.name()) {
                return Err(FailureCause::Exit { code: 1 });
            }
            Ok(())
        }
    }
}
