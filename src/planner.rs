// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the Cartesian path planner.
//!
//! Planning is split into two stages:
//! * [sampler](`crate::planner::sampler`) - interpolates poses between a start and an end pose.
//! * [path_check](`crate::planner::path_check`) - resolves every sampled pose to a joint
//! configuration and classifies each step.
pub mod bias;
pub mod path_check;
pub mod sampler;
pub mod step_status;
