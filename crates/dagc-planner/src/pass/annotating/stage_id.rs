use dagc_core::dag::Dag;
use dagc_core::error::{Error, Result};
use dagc_core::property::ExecutionProperty;
use dagc_stage::assign_stages;

use super::Annotation;

/// Writes the stage every vertex will be lowered into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageIdPass;

impl StageIdPass {
    pub fn annotate(&self, dag: &Dag) -> Result<Vec<Annotation>> {
        assign_stages(dag)?
            .into_iter()
            .map(|(v, stage)| {
                let id = u32::try_from(stage.get())
                    .map_err(|_| Error::Lowering(format!("{} does not fit a stage id property", stage)))?;
                Ok(Annotation::Vertex(v, ExecutionProperty::StageId(id)))
            })
            .collect()
    }
}
