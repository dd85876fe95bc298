use std::fmt::{self, Display, Formatter};

/// Position of a skeleton in [`crate::model::Model::skeletons`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SkeletonHandle(pub usize);

/// Position of an animation in [`crate::model::Model::animations`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnimationHandle(pub usize);

impl Display for SkeletonHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "skeleton #{}", self.0)
    }
}

impl Display for AnimationHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "animation #{}", self.0)
    }
}

impl From<usize> for SkeletonHandle {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl From<usize> for AnimationHandle {
    fn from(index: usize) -> Self {
        Self(index)
    }
}
