//! The linear setup flow: connect, deploy, create delegate, choose plan, manage.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Step {
    Connect,
    Deploy,
    CreateDelegate,
    ChoosePlan,
    Manage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    WalletConnected,
    WalletDisconnected,
    AccountDeployed,
    DelegateCreated,
    PlanChosen,
    /// Jump to plan selection: from a connected first step once the accounts
    /// already exist, or back from the management view.
    SkipToPlans,
}

/// Facts observed about the session, used to pick the step on resume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Observed {
    pub connected: bool,
    pub delegator_deployed: bool,
    pub delegate_present: bool,
    pub delegation_stored: bool,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::Connect,
        Step::Deploy,
        Step::CreateDelegate,
        Step::ChoosePlan,
        Step::Manage,
    ];

    /// 1-based position in the flow.
    pub fn number(self) -> u8 {
        match self {
            Step::Connect => 1,
            Step::Deploy => 2,
            Step::CreateDelegate => 3,
            Step::ChoosePlan => 4,
            Step::Manage => 5,
        }
    }

    pub fn from_number(n: u8) -> Option<Step> {
        Step::ALL.get(usize::from(n).checked_sub(1)?).copied()
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::Connect => "Connect wallet",
            Step::Deploy => "Deploy smart account",
            Step::CreateDelegate => "Create delegate account",
            Step::ChoosePlan => "Choose a plan",
            Step::Manage => "Manage subscription",
        }
    }

    /// Transition on `event`. Events that do not apply leave the step unchanged.
    pub fn next(self, event: StepEvent) -> Step {
        match (self, event) {
            (_, StepEvent::WalletDisconnected) => Step::Connect,
            (Step::Connect, StepEvent::WalletConnected) => Step::Deploy,
            (Step::Deploy, StepEvent::AccountDeployed) => Step::CreateDelegate,
            (Step::CreateDelegate, StepEvent::DelegateCreated) => Step::ChoosePlan,
            (Step::ChoosePlan, StepEvent::PlanChosen) => Step::Manage,
            (Step::Connect | Step::Manage, StepEvent::SkipToPlans) => Step::ChoosePlan,
            (step, _) => step,
        }
    }

    /// The step implied by `observed`, e.g. after a reload.
    pub fn resume(observed: &Observed) -> Step {
        if !observed.connected {
            Step::Connect
        } else if !observed.delegator_deployed {
            Step::Deploy
        } else if !observed.delegate_present {
            Step::CreateDelegate
        } else if !observed.delegation_stored {
            Step::ChoosePlan
        } else {
            Step::Manage
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}. {}", self.number(), self.title())
    }
}

/// Holds the current step of one setup session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wizard {
    step: Step,
}

impl Default for Wizard {
    fn default() -> Self {
        Self {
            step: Step::Connect,
        }
    }
}

impl Wizard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resume(observed: &Observed) -> Self {
        Self {
            step: Step::resume(observed),
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn apply(&mut self, event: StepEvent) -> Step {
        let next = self.step.next(event);
        if next != self.step {
            tracing::debug!(from = %self.step, to = %next, "wizard step changed");
        }
        self.step = next;
        next
    }
}
