// SPDX-License-Identifier: MIT

//! Test helpers and proptest strategies shared across crates.

pub mod strategies {
    use crate::issue::{IssueStatus, Priority, Risk, Size};
    use proptest::prelude::*;

    pub fn arb_issue_status() -> impl Strategy<Value = IssueStatus> {
        prop_oneof![
            Just(IssueStatus::Open),
            Just(IssueStatus::Ready),
            Just(IssueStatus::Running),
            Just(IssueStatus::Done),
            Just(IssueStatus::Escalated),
            Just(IssueStatus::Blocked),
        ]
    }

    pub fn arb_priority() -> impl Strategy<Value = Priority> {
        prop_oneof![Just(Priority::P0), Just(Priority::P1), Just(Priority::P2), Just(Priority::P3)]
    }

    pub fn arb_risk() -> impl Strategy<Value = Risk> {
        prop_oneof![Just(Risk::Low), Just(Risk::Medium), Just(Risk::High), Just(Risk::Critical)]
    }

    pub fn arb_size() -> impl Strategy<Value = Size> {
        prop_oneof![Just(Size::XS), Just(Size::S), Just(Size::M), Just(Size::L), Just(Size::XL)]
    }
}
