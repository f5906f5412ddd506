//! Ordered, single-stage module collections.

use std::sync::Arc;

use crate::errors::Result;
use crate::types::{Item, Schema};

use super::errors::PipelineRuntimeError;
use super::traits::{StageModule, StageType};

/// The modules of one stage, in insertion order.
///
/// The stage is fixed by the module type, so a `Link<FeatureModule>` can only
/// ever hold feature modules.
#[derive(Debug)]
pub struct Link<M: StageModule> {
    modules: Vec<M>,
    schema: Arc<Schema>,
}

impl<M: StageModule> Default for Link<M> {
    fn default() -> Self {
        Self::new(Arc::new(Schema::new()))
    }
}

impl<M: StageModule> Link<M> {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            modules: Vec::new(),
            schema,
        }
    }

    pub fn stage(&self) -> StageType {
        M::STAGE
    }

    /// Append a module and hand it the current schema.
    pub fn add_module(&mut self, mut module: M) {
        module.set_schema(&self.schema);
        self.modules.push(module);
    }

    /// Replace every module with `module`.
    pub fn replace(&mut self, module: M) {
        self.modules.clear();
        self.add_module(module);
    }

    /// Store a new schema and propagate it to every module.
    pub fn set_schema(&mut self, schema: Arc<Schema>) {
        for m in &mut self.modules {
            m.set_schema(&schema);
        }
        self.schema = schema;
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Ready to run: at least one module attached.
    pub fn is_ready(&self) -> bool {
        !self.is_empty()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn modules(&self) -> &[M] {
        &self.modules
    }

    pub(crate) fn modules_mut(&mut self) -> &mut [M] {
        &mut self.modules
    }

    pub fn first(&self) -> Option<&M> {
        self.modules.first()
    }

    pub(crate) fn first_mut(&mut self) -> Option<&mut M> {
        self.modules.first_mut()
    }

    /// Output keys in module order.
    pub fn output_keys(&self) -> Vec<String> {
        self.modules
            .iter()
            .filter_map(|m| m.output_key().map(str::to_owned))
            .collect()
    }

    /// Drive `item` through every module in order. Stops early when a module
    /// consumes the item.
    pub fn process(&mut self, item: Item) -> Result<Option<Item>> {
        let mut current = item;
        for (index, module) in self.modules.iter_mut().enumerate() {
            match module.process(current) {
                Ok(Some(next)) => current = next,
                Ok(None) => return Ok(None),
                Err(err) => {
                    return Err(PipelineRuntimeError::from_module(M::STAGE, index, &err).into())
                }
            }
        }
        Ok(Some(current))
    }

    /// Independent link with deep-copied modules.
    pub fn deep_copy(&self) -> Self {
        Self {
            modules: self.modules.iter().map(M::deep_copy).collect(),
            schema: Arc::clone(&self.schema),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SocialMeterError;
    use crate::features::{ExcessiveCapitals, Feature, WordCount};
    use crate::pipeline::error_code::ErrorCode;
    use crate::pipeline::module::FeatureModule;
    use crate::types::Value;

    fn feature_link(keys: &[&str]) -> Link<FeatureModule> {
        let mut schema = Schema::new();
        for k in keys {
            schema.add_derived(*k).unwrap();
        }
        let mut link = Link::new(Arc::new(schema));
        for k in keys {
            link.add_module(FeatureModule::with_key(
                Feature::new(Arc::new(WordCount::new())),
                *k,
            ));
        }
        link
    }

    #[test]
    fn test_link_runs_modules_in_order() {
        let mut link = feature_link(&["a", "b"]);
        let item = Item::with_text(Arc::clone(link.schema()), "x y");
        let out = link.process(item).unwrap().unwrap();
        assert_eq!(out.get("a"), Some(&Value::Number(2.0)));
        assert_eq!(out.get("b"), Some(&Value::Number(2.0)));
        assert_eq!(link.output_keys(), vec!["a", "b"]);
        assert_eq!(link.stage(), StageType::FeatureExtract);
    }

    #[test]
    fn test_module_error_names_stage_and_index() {
        let mut link = feature_link(&["a"]);
        // Second module writes a key the schema does not declare.
        link.add_module(FeatureModule::with_key(
            Feature::new(Arc::new(ExcessiveCapitals::new())),
            "missing",
        ));
        let item = Item::with_text(Arc::clone(link.schema()), "x");
        match link.process(item).unwrap_err() {
            SocialMeterError::Stage(rt) => {
                assert_eq!(rt.code, ErrorCode::UnknownField);
                assert_eq!(rt.path, "/features/1");
                assert_eq!(rt.stage, "feature_extract");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let link = feature_link(&["a"]);
        let mut copy = link.deep_copy();
        copy.add_module(FeatureModule::with_key(
            Feature::new(Arc::new(WordCount::new())),
            "b",
        ));
        assert_eq!(link.len(), 1);
        assert_eq!(copy.len(), 2);
        assert_ne!(link.modules()[0].id(), copy.modules()[0].id());
    }

    #[test]
    fn test_empty_link_is_not_ready() {
        let link: Link<FeatureModule> = Link::default();
        assert!(!link.is_ready());
        assert!(feature_link(&["a"]).is_ready());
    }
}
