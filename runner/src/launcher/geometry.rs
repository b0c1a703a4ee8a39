use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("{0} must be a positive integer")]
    NotPositive(&'static str),
}

/// Distribution of MPI ranks over the allocated hardware
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct JobGeometry {
    nodes: NonZeroU32,
    ntasks_per_node: NonZeroU32,
    #[serde(default = "single_cpu")]
    cpus_per_task: NonZeroU32,
}

fn single_cpu() -> NonZeroU32 {
    NonZeroU32::MIN
}

fn positive(value: u32, name: &'static str) -> Result<NonZeroU32, GeometryError> {
    NonZeroU32::new(value).ok_or(GeometryError::NotPositive(name))
}

impl JobGeometry {
    pub fn new(nodes: u32, ntasks_per_node: u32, cpus_per_task: u32) -> Result<Self, GeometryError> {
        Ok(Self {
            nodes: positive(nodes, "nodes")?,
            ntasks_per_node: positive(ntasks_per_node, "ntasks_per_node")?,
            cpus_per_task: positive(cpus_per_task, "cpus_per_task")?,
        })
    }

    pub fn nodes(&self) -> u32 {
        self.nodes.get()
    }

    pub fn ntasks_per_node(&self) -> u32 {
        self.ntasks_per_node.get()
    }

    pub fn cpus_per_task(&self) -> u32 {
        self.cpus_per_task.get()
    }

    /// total number of MPI ranks, recomputed on every call
    pub fn total_tasks(&self) -> u64 {
        u64::from(self.nodes.get()) * u64::from(self.ntasks_per_node.get())
    }

    /// more than one core per rank, the remaining cores are meant for threads
    pub fn is_hybrid(&self) -> bool {
        self.cpus_per_task.get() > 1
    }
}

impl Default for JobGeometry {
    fn default() -> Self {
        Self {
            nodes: NonZeroU32::MIN,
            ntasks_per_node: NonZeroU32::MIN,
            cpus_per_task: NonZeroU32::MIN,
        }
    }
}
