/// One command bound to the host it runs on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub host: String,
    pub command: String,
}

/// An ordered list of steps, executed strictly one after another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisioningPlan {
    steps: Vec<Step>,
}

impl ProvisioningPlan {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step
    pub fn push(&mut self, host: impl Into<String>, command: impl Into<String>) -> &mut Self {
        self.steps.push(Step {
            host: host.into(),
            command: command.into(),
        });
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl<'a> IntoIterator for &'a ProvisioningPlan {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
