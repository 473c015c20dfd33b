//! Model records handed over by a model provider
//!
//! Loading and classifying trained models happens outside this crate; the
//! pipeline only needs each model's index, name, technology and kind.

use crate::error::{ExperimentError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Learning task a model solves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Classifier,
    Regressor,
}

/// Framework a model was produced with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTechnology {
    Sklearn,
    Onnx,
    #[default]
    Custom,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classifier => write!(f, "classifier"),
            Self::Regressor => write!(f, "regressor"),
        }
    }
}

impl fmt::Display for ModelTechnology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sklearn => write!(f, "sklearn"),
            Self::Onnx => write!(f, "onnx"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// Model description as written in an experiment input file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    #[serde(default)]
    pub technology: ModelTechnology,
    pub kind: ModelKind,
}

/// One loaded model; `object` is whatever handle the provider keeps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord<M = ()> {
    pub index: usize,
    pub name: String,
    pub technology: ModelTechnology,
    pub kind: ModelKind,
    #[serde(skip)]
    pub object: M,
}

impl<M> ModelRecord<M> {
    /// Copy of the description without the model handle
    pub fn detached(&self) -> ModelRecord {
        ModelRecord {
            index: self.index,
            name: self.name.clone(),
            technology: self.technology,
            kind: self.kind,
            object: (),
        }
    }
}

/// Source of model records, in model-index order
pub trait ModelProvider {
    type Model;

    fn load(&self) -> Result<Vec<ModelRecord<Self::Model>>>;
}

/// Provider over an already-built list of records
#[derive(Debug, Clone, Default)]
pub struct StaticModelProvider<M = ()> {
    records: Vec<ModelRecord<M>>,
}

impl<M> StaticModelProvider<M> {
    /// Records must carry unique indices
    pub fn new(records: Vec<ModelRecord<M>>) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        for record in &records {
            if !seen.insert(record.index) {
                return Err(ExperimentError::InvalidInput(format!(
                    "duplicate model index {}",
                    record.index
                )));
            }
        }
        Ok(Self { records })
    }
}

impl StaticModelProvider<()> {
    /// Index specs by their position
    pub fn from_specs(specs: &[ModelSpec]) -> Self {
        let records = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| ModelRecord {
                index,
                name: spec.name.clone(),
                technology: spec.technology,
                kind: spec.kind,
                object: (),
            })
            .collect();
        Self { records }
    }
}

impl<M: Clone> ModelProvider for StaticModelProvider<M> {
    type Model = M;

    fn load(&self) -> Result<Vec<ModelRecord<M>>> {
        let mut records = self.records.clone();
        records.sort_by_key(|r| r.index);
        Ok(records)
    }
}

/// Display names for `count` models; models without a record get `model_<index>`
pub fn resolve_model_names<M>(records: &[ModelRecord<M>], count: usize) -> Vec<String> {
    (0..count)
        .map(|index| {
            records
                .iter()
                .find(|r| r.index == index)
                .map(|r| r.name.clone())
                .unwrap_or_else(|| format!("model_{}", index))
        })
        .collect()
}
