//! Emulation of a projector which runs on several compute devices.
//!
//! Each replica plays the part of one device: it receives its own copy of the
//! image and of the projection data, and processes a disjoint share of the
//! requested views. The partial results are summed onto the first replica and
//! only then handed back to the caller.

use rayon::prelude::*;

use crate::{
    fov::FOV,
    image::Image,
    projdata::{ProjData, ProjDataInfo, Segments},
    subsets::ViewSubset,
};
use super::{ProjectorPair, ProjectionError};

#[derive(Clone, Debug)]
pub struct Replicated<P> {
    inner: P,
    replicas: usize,
}

impl<P: ProjectorPair> Replicated<P> {

    pub fn new(inner: P, replicas: usize) -> Result<Self, ProjectionError> {
        if replicas == 0 { return Err(ProjectionError::NoReplicas) }
        Ok(Self { inner, replicas })
    }

    pub fn replicas(&self) -> usize { self.replicas }

    /// Run `job` once per replica with that replica's share of `views`.
    /// Replicas without any views are skipped. Any failure fails the whole call.
    fn fan_out<T, F>(&self, views: &ViewSubset, job: F) -> Result<Vec<T>, ProjectionError>
    where
        T: Send,
        F: Fn(&ViewSubset) -> Result<T, ProjectionError> + Sync + Send,
    {
        let shares = views.split(self.replicas);
        shares
            .par_iter()
            .enumerate()
            .filter(|(_, share)| !share.is_empty())
            .map(|(replica, share)| {
                tracing::trace!(replica, views = share.len(), "replica job");
                job(share).map_err(|e| ProjectionError::Replica { replica, source: Box::new(e) })
            })
            .collect()
    }
}

impl<P: ProjectorPair> ProjectorPair for Replicated<P> {

    fn check_compatibility(&self, fov: &FOV, info: &ProjDataInfo) -> Result<(), ProjectionError> {
        self.inner.check_compatibility(fov, info)
    }

    fn forward_project(&self, out: &mut ProjData, image: &Image, views: &ViewSubset, segments: Segments) -> Result<(), ProjectionError> {
        let empty = ProjData::zeros(out.info().clone());
        let partials = self.fan_out(views, |share| {
            let image = image.clone();
            let mut data = empty.clone();
            self.inner.forward_project(&mut data, &image, share, segments.clone())?;
            Ok(data)
        })?;
        // Bins outside a replica's share are zero in that replica, so summing
        // onto the first replica assembles the full projection
        let mut partials = partials.into_iter();
        let Some(mut first) = partials.next() else { return Ok(()) };
        for partial in partials {
            first.as_mut_slice().iter_mut()
                .zip(partial.as_slice())
                .for_each(|(l, r)| *l += r);
        }
        let info = out.info().clone();
        out.copy_bins_from(&first, info.selected_indices(views, segments));
        Ok(())
    }

    fn back_project(&self, out: &mut Image, bins: &ProjData, views: &ViewSubset, segments: Segments) -> Result<(), ProjectionError> {
        let fov = out.fov;
        let partials = self.fan_out(views, |share| {
            let data = bins.clone();
            let mut image = Image::zeros(fov);
            self.inner.back_project(&mut image, &data, share, segments.clone())?;
            Ok(image)
        })?;
        let mut partials = partials.into_iter();
        let Some(mut first) = partials.next() else { return Ok(()) };
        for partial in partials {
            first.add_scaled(&partial, 1.0);
        }
        out.add_scaled(&first, 1.0);
        Ok(())
    }
}
