use std::fmt;

/// A step of the extraction, dataset or bond-energy pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadMolecules,
    ExtractAToB,
    ExtractAToBC,
    FilterReactions,
    WriteArchive,
    LoadReactions,
    WriteDataset,
    WriteBondEnergies,
}

impl Stage {
    /// What the count reported when the stage finishes refers to.
    pub fn unit(&self) -> &'static str {
        match self {
            Self::LoadMolecules => "molecules",
            Self::WriteDataset => "records",
            _ => "reactions",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LoadMolecules => "Loading molecules",
            Self::ExtractAToB => "Extracting A -> B",
            Self::ExtractAToBC => "Extracting A -> B + C",
            Self::FilterReactions => "Filtering reactions",
            Self::WriteArchive => "Writing reaction archive",
            Self::LoadReactions => "Loading reactions",
            Self::WriteDataset => "Writing dataset",
            Self::WriteBondEnergies => "Writing bond energies",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    StageStart(Stage),
    /// `count` is measured in [`Stage::unit`].
    StageFinish { stage: Stage, count: usize },

    /// `A -> B + C` enumeration over `total` reactant formulas begins.
    FormulasStart { total: u64 },
    /// One reactant formula has been searched.
    FormulaDone { reactions: usize },
    FormulasFinish,

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    pub fn start(&self, stage: Stage) {
        self.report(Progress::StageStart(stage));
    }

    pub fn finish(&self, stage: Stage, count: usize) {
        self.report(Progress::StageFinish { stage, count });
    }
}

impl fmt::Debug for ProgressReporter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
