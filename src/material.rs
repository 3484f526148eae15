use std::sync::Arc;

use crate::id_arena::{Id, IdArena};
use crate::reflection::bsdf::Bsdf;
use crate::reflection::Bxdf;
use crate::spectrum::Reflector;
use crate::{Float, Vec3f};

pub type MaterialId = Id<Bxdf>;

/// Owns every scattering function of a scene for the scene's whole lifetime. Surfaces refer to
/// their material by [`MaterialId`] and borrow it per bounce.
#[derive(Debug, Default)]
pub struct MaterialGraph {
    bxdfs: IdArena<Bxdf>,
}

impl MaterialGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, bxdf: Bxdf) -> MaterialId {
        self.bxdfs.insert(bxdf)
    }

    /// Materials that scatter nothing are not stored; `None` marks a pure emitter.
    pub fn add_optional(&mut self, bxdf: Option<Bxdf>) -> Option<MaterialId> {
        bxdf.map(|b| self.add(b))
    }

    pub fn get(&self, id: MaterialId) -> &Bxdf {
        &self.bxdfs[id]
    }

    pub fn len(&self) -> usize {
        self.bxdfs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bxdfs.is_empty()
    }

    pub fn bsdf(&self, id: MaterialId, surface_normal: Vec3f, shading_normal: Vec3f) -> Bsdf<'_> {
        Bsdf::new(self.get(id), surface_normal, shading_normal, true)
    }

    /// Diffuse surface, Lambertian when `sigma` is zero and Oren-Nayar otherwise.
    pub fn matte(&mut self, kd: Option<Arc<dyn Reflector>>, sigma: Float) -> Option<MaterialId> {
        let bxdf = if sigma == 0.0 {
            Bxdf::lambertian(kd)
        } else {
            Bxdf::oren_nayar(kd, sigma)
        };
        self.add_optional(bxdf)
    }

    /// Diffuse base under a glossy coat.
    pub fn plastic(
        &mut self,
        kd: Option<Arc<dyn Reflector>>,
        ks: Option<Arc<dyn Reflector>>,
        roughness: Float,
    ) -> Option<MaterialId> {
        self.add_optional(Bxdf::ashikhmin_shirley(kd, ks, roughness))
    }

    pub fn glass(
        &mut self,
        kr: Option<Arc<dyn Reflector>>,
        kt: Option<Arc<dyn Reflector>>,
        eta: Float,
    ) -> Option<MaterialId> {
        self.add_optional(Bxdf::specular_dielectric(kr, kt, 1.0, eta))
    }

    pub fn mirror(&mut self, kr: Option<Arc<dyn Reflector>>) -> Option<MaterialId> {
        self.add_optional(Bxdf::mirror(kr))
    }
}
