use std::{io, path::Path};

use log::debug;

use crate::{
    animation::Animation,
    animator::{Animator, AnimatorError},
    archive::Archive,
    index::{AnimationHandle, SkeletonHandle},
    loader::{
        gltf::{parse_file, parse_from_archive, parse_slice},
        model::ModelBuilder,
        LoadError, LoadParams,
    },
    mesh::{Mesh, MeshGpuHandles},
    render::RenderBackend,
    skin::Skeleton,
};

/// A loaded asset: meshes, skeletons and animations, plus the playback state
/// of at most one animation.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub meshes: Vec<Mesh>,
    pub skeletons: Vec<Skeleton>,
    pub animations: Vec<Animation>,
    animator: Option<Animator>,
}

impl Model {
    pub fn new(meshes: Vec<Mesh>, skeletons: Vec<Skeleton>, animations: Vec<Animation>) -> Self {
        Self {
            meshes,
            skeletons,
            animations,
            animator: None,
        }
    }

    /// Load a `.gltf` or `.glb` file. Sidecar files resolve against its directory.
    pub fn load<P: AsRef<Path>>(path: P, params: &LoadParams) -> Result<Self, LoadError<io::Error>> {
        let asset = parse_file(path, params)?;
        Ok(ModelBuilder::new(&asset, params).build()?)
    }

    /// Load the model file named by `params` out of an archive.
    pub fn load_from_archive<A: Archive>(
        archive: &mut A,
        params: &LoadParams,
    ) -> Result<Self, LoadError<A::Error>> {
        let asset = parse_from_archive(archive, params)?;
        Ok(ModelBuilder::new(&asset, params).build()?)
    }

    /// Load a model already read into memory.
    pub fn load_slice<A: Archive>(
        data: &[u8],
        archive: &mut A,
        base: &Path,
        params: &LoadParams,
    ) -> Result<Self, LoadError<A::Error>> {
        let asset = parse_slice(data, archive, base, params)?;
        Ok(ModelBuilder::new(&asset, params).build()?)
    }

    pub fn skeleton(&self, handle: SkeletonHandle) -> Option<&Skeleton> {
        self.skeletons.get(handle.0)
    }

    pub fn animation(&self, handle: AnimationHandle) -> Option<&Animation> {
        self.animations.get(handle.0)
    }

    pub fn find_animation(&self, name: &str) -> Option<AnimationHandle> {
        self.animations
            .iter()
            .position(|animation| animation.name.as_deref() == Some(name))
            .map(AnimationHandle)
    }

    /// Bind `animation` to `skeleton` and start playing it from the beginning.
    pub fn play(
        &mut self,
        skeleton: SkeletonHandle,
        animation: AnimationHandle,
        speed: f32,
        looping: bool,
    ) -> Result<(), AnimatorError> {
        let animator = self.animator.get_or_insert_with(Animator::new);
        animator.bind(
            &self.skeletons,
            &self.animations,
            skeleton,
            animation,
            speed,
            looping,
        )
    }

    /// Advance the current animation, if any, by `delta_time` seconds.
    pub fn update(&mut self, delta_time: f32) -> Result<(), AnimatorError> {
        match self.animator.as_mut() {
            Some(animator) => animator.update(&self.skeletons, &self.animations, delta_time),
            None => Ok(()),
        }
    }

    pub fn seek(&mut self, time: f32) -> Result<(), AnimatorError> {
        match self.animator.as_mut() {
            Some(animator) => animator.seek(&self.skeletons, &self.animations, time),
            None => Ok(()),
        }
    }

    pub fn animator(&self) -> Option<&Animator> {
        self.animator.as_ref()
    }

    pub fn animator_mut(&mut self) -> Option<&mut Animator> {
        self.animator.as_mut()
    }

    /// Hand every mesh and its textures to `backend`, keeping the handles it
    /// returns. Meshes uploaded before are uploaded again. On error no mesh
    /// handles change.
    pub fn upload<B: RenderBackend>(&mut self, backend: &mut B) -> Result<(), B::Error> {
        let mut uploaded = Vec::with_capacity(self.meshes.len());
        for mesh in &self.meshes {
            let (vertex_buffer, index_buffer) = backend.upload_mesh(mesh)?;
            let texture_views = mesh
                .textures
                .iter()
                .map(|texture| backend.create_texture_view(texture))
                .collect::<Result<Vec<_>, _>>()?;
            debug!(
                "Uploaded mesh {:?}: vertices {}, indices {}, {} texture view(s)",
                mesh.name,
                vertex_buffer,
                index_buffer,
                texture_views.len()
            );
            uploaded.push(MeshGpuHandles {
                vertex_buffer,
                index_buffer,
                texture_views,
            });
        }
        for (mesh, gpu) in self.meshes.iter_mut().zip(uploaded) {
            mesh.gpu = Some(gpu);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use glam::{Mat4, Vec3};

    use super::*;
    use crate::{
        animator::PlaybackState,
        archive::DirectoryArchive,
        loader::fixture::{encode_png, GlbBuilder},
        render::GpuHandle,
        texture::Texture,
    };

    #[derive(Default)]
    struct CountingBackend {
        next: u64,
        bytes: usize,
        fail_textures: bool,
        // Meshes accepted before `upload_mesh` starts failing
        mesh_limit: Option<usize>,
    }

    impl CountingBackend {
        fn handle(&mut self) -> GpuHandle {
            self.next += 1;
            GpuHandle(self.next)
        }
    }

    impl RenderBackend for CountingBackend {
        type Error = String;

        fn upload_mesh(&mut self, mesh: &Mesh) -> Result<(GpuHandle, GpuHandle), Self::Error> {
            if let Some(limit) = self.mesh_limit.as_mut() {
                if *limit == 0 {
                    return Err(format!("no room for mesh {:?}", mesh.name));
                }
                *limit -= 1;
            }
            self.bytes += mesh.vertex_bytes().len() + mesh.index_bytes().len();
            Ok((self.handle(), self.handle()))
        }

        fn create_texture_view(&mut self, texture: &Texture) -> Result<GpuHandle, Self::Error> {
            if self.fail_textures {
                return Err(format!("no room for {}x{}", texture.width, texture.height));
            }
            Ok(self.handle())
        }
    }

    /// hip(0) -> knee(1), skinned, with a two-second walk sliding the hip along X.
    fn walking_builder() -> GlbBuilder {
        let mut builder = GlbBuilder::default();
        let positions = builder.push_positions(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        let joints = builder.push_u8(&[0, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0], "VEC4", false);
        let weights = builder.push_u8(&[255, 0, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0], "VEC4", true);
        let png = encode_png(1, 1, &[255, 255, 255, 255]);
        let image = builder.push_image(&png, "image/png");
        let material = builder.push_textured_material(image);
        builder.push_mesh(
            "body",
            &format!(
                r#""POSITION":{},"JOINTS_0":{},"WEIGHTS_0":{}"#,
                positions, joints, weights
            ),
            None,
            Some(material),
        );
        builder.push_node(r#"{"name":"hip","children":[1]}"#);
        builder.push_node(r#"{"name":"knee","translation":[0,1,0]}"#);
        builder.push_node(r#"{"name":"body","mesh":0,"skin":0}"#);
        let mut inverse_bind = Mat4::IDENTITY.to_cols_array().to_vec();
        inverse_bind.extend(Mat4::from_translation(Vec3::NEG_Y).to_cols_array());
        let inverse_bind = builder.push_f32(&inverse_bind, "MAT4");
        builder.push_skin(&format!(
            r#"{{"joints":[0,1],"inverseBindMatrices":{}}}"#,
            inverse_bind
        ));
        let times = builder.push_times(&[0.0, 2.0]);
        let translations = builder.push_f32(&[0.0, 0.0, 0.0, 2.0, 0.0, 0.0], "VEC3");
        builder.push_animation(&format!(
            r#"{{"name":"walk","samplers":[{{"input":{},"output":{}}}],
               "channels":[{{"sampler":0,"target":{{"node":0,"path":"translation"}}}}]}}"#,
            times, translations
        ));
        builder
    }

    fn walking_model() -> Vec<u8> {
        walking_builder().build()
    }

    fn load() -> Model {
        let data = walking_model();
        let mut archive = DirectoryArchive::new(".");
        Model::load_slice(&data, &mut archive, Path::new(""), &LoadParams::default()).unwrap()
    }

    #[test]
    fn play_and_update() {
        let mut model = load();
        assert!(model.animator().is_none());
        let walk = model.find_animation("walk").unwrap();
        assert_eq!(model.animation(walk).unwrap().duration, 2.0);
        assert!(model.find_animation("run").is_none());

        model.update(1.0).unwrap();
        model.play(SkeletonHandle(0), walk, 1.0, true).unwrap();
        // Bind pose cancels out
        let palette = model.animator().unwrap().final_bone_transforms();
        assert_eq!(palette[1], Mat4::IDENTITY);

        model.update(0.5).unwrap();
        let palette = model.animator().unwrap().final_bone_transforms();
        let offset = Mat4::from_translation(Vec3::new(0.5, 0.0, 0.0));
        assert!(palette[0].abs_diff_eq(offset, 1e-6));
        assert!(palette[1].abs_diff_eq(offset, 1e-6));

        model.update(2.0).unwrap();
        assert_eq!(model.animator().unwrap().current_time(), 0.5);

        model.animator_mut().unwrap().pause();
        model.seek(1.5).unwrap();
        let animator = model.animator().unwrap();
        assert_eq!(animator.state(), PlaybackState::Paused);
        assert!(animator.final_bone_transforms()[0]
            .abs_diff_eq(Mat4::from_translation(Vec3::new(1.5, 0.0, 0.0)), 1e-6));
    }

    #[test]
    fn play_rejects_bad_handles() {
        let mut model = load();
        assert_eq!(
            model.play(SkeletonHandle(1), AnimationHandle(0), 1.0, false),
            Err(AnimatorError::InvalidSkeleton(SkeletonHandle(1)))
        );
        assert_eq!(
            model.play(SkeletonHandle(0), AnimationHandle(7), 1.0, false),
            Err(AnimatorError::InvalidAnimation(AnimationHandle(7)))
        );
        assert_eq!(model.animator().unwrap().state(), PlaybackState::Unbound);
        assert!(model.skeleton(SkeletonHandle(0)).is_some());
    }

    #[test]
    fn upload_fills_gpu_handles() {
        let mut model = load();
        let mut backend = CountingBackend::default();
        model.upload(&mut backend).unwrap();

        let gpu = model.meshes[0].gpu.as_ref().unwrap();
        assert_eq!(gpu.vertex_buffer, GpuHandle(1));
        assert_eq!(gpu.index_buffer, GpuHandle(2));
        assert_eq!(gpu.texture_views, vec![GpuHandle(3)]);
        assert_eq!(
            backend.bytes,
            model.meshes[0].vertices.len() * std::mem::size_of::<crate::mesh::Vertex>()
                + model.meshes[0].indices.len() * 4
        );

        let mut failing = CountingBackend {
            fail_textures: true,
            ..Default::default()
        };
        let mut model = load();
        assert_eq!(
            model.upload(&mut failing),
            Err(String::from("no room for 1x1"))
        );
        assert!(model.meshes[0].gpu.is_none());
    }

    #[test]
    fn failed_upload_keeps_previous_handles() {
        let mut model = load();
        model.meshes.push(model.meshes[0].clone());
        model.upload(&mut CountingBackend::default()).unwrap();
        let before: Vec<_> = model.meshes.iter().map(|mesh| mesh.gpu.clone()).collect();
        assert!(before.iter().all(Option::is_some));

        // Second mesh fails after the first one got fresh handles
        let mut failing = CountingBackend {
            next: 100,
            mesh_limit: Some(1),
            ..Default::default()
        };
        assert_eq!(
            model.upload(&mut failing),
            Err(String::from("no room for mesh Some(\"body\")"))
        );
        assert_eq!(failing.next, 103);
        let after: Vec<_> = model.meshes.iter().map(|mesh| mesh.gpu.clone()).collect();
        assert_eq!(after, before);

        let mut model = load();
        model.meshes.push(model.meshes[0].clone());
        let mut failing = CountingBackend {
            mesh_limit: Some(1),
            ..Default::default()
        };
        assert!(model.upload(&mut failing).is_err());
        assert!(model.meshes.iter().all(|mesh| mesh.gpu.is_none()));
    }

    #[test]
    fn load_from_directory_archive() {
        let directory = std::env::temp_dir().join(format!("skinning-asset-{}", std::process::id()));
        std::fs::create_dir_all(&directory).unwrap();
        std::fs::write(directory.join("model.glb"), walking_model()).unwrap();

        let mut archive = DirectoryArchive::new(&directory);
        let model = Model::load_from_archive(&mut archive, &LoadParams::default()).unwrap();
        assert_eq!(model.meshes.len(), 1);
        assert_eq!(model.skeletons[0].joints.len(), 2);

        let model = Model::load(directory.join("model.glb"), &LoadParams::default()).unwrap();
        assert_eq!(model.animations.len(), 1);

        std::fs::remove_dir_all(&directory).unwrap();
    }

    #[cfg(feature = "zip")]
    #[test]
    fn load_from_zip_archive() {
        use std::io::{Cursor, Write};

        use zip::{write::FileOptions, CompressionMethod, ZipWriter};

        let (json, bin) = walking_builder().into_gltf("walk.bin");
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("scenes/walk.gltf", options).unwrap();
        writer.write_all(json.as_bytes()).unwrap();
        writer.start_file("scenes/walk.bin", options).unwrap();
        writer.write_all(&bin).unwrap();
        let mut data = writer.finish().unwrap();
        data.set_position(0);

        let params = LoadParams {
            model_file_name: String::from("scenes/walk"),
            ..Default::default()
        };
        let mut archive = crate::archive::zip::open(data).unwrap();
        let model = Model::load_from_archive(&mut archive, &params).unwrap();
        assert_eq!(model.meshes[0].vertices.len(), 3);
        assert_eq!(model.find_animation("walk"), Some(AnimationHandle(0)));

        let missing = LoadParams {
            model_file_name: String::from("walk"),
            ..Default::default()
        };
        assert!(matches!(
            Model::load_from_archive(&mut archive, &missing),
            Err(LoadError::Parse(
                crate::loader::gltf::ParseError::ModelNotFound(_)
            ))
        ));
    }
}
