use ember_shader_gen::{GenerateError, InputAttribute, MslCodeGenerator};
use ember_shader_graph::{
    FragmentShader, SamplerFilter, UniformType, ValueType, VertexShader,
};

fn position_attributes() -> Vec<InputAttribute> {
    vec![InputAttribute::VertexInPosition { geometry_index: 0 }]
}

fn pos_uv_attributes() -> Vec<InputAttribute> {
    vec![
        InputAttribute::VertexInPosition { geometry_index: 0 },
        InputAttribute::VertexInTexCoord0 { geometry_index: 0 },
    ]
}

#[test]
fn one_source_with_id_suffixed_entry_points() {
    let vsh = VertexShader::new();
    let fsh = FragmentShader::new();
    let source = MslCodeGenerator::new()
        .generate_shader_code(&vsh, &fsh, &position_attributes())
        .expect("generate");

    assert!(
        source.contains(&format!("vertex Fragment vertex{}(Vertex in [[stage_in]],", vsh.id())),
        "source:\n{source}"
    );
    assert!(
        source.contains(&format!("fragment float4 fragment{}(Fragment in [[stage_in]],", fsh.id())),
        "source:\n{source}"
    );
    assert!(source.contains("#include <metal_stdlib>"), "source:\n{source}");
    // The vertex stage's argument buffers follow the vertex attributes.
    assert!(
        source.contains("constant Uniforms & uniforms [[ buffer(1) ]],"),
        "source:\n{source}"
    );
    assert!(
        source.contains("constant InstanceUniforms *instances [[ buffer(2) ]],"),
        "source:\n{source}"
    );
    assert!(
        source.contains("float3 pos0 [[attribute(0)]];"),
        "source:\n{source}"
    );
    assert!(
        source.contains("out.pos = v2 * float4(in.pos0,1.0);"),
        "source:\n{source}"
    );
    assert!(source.contains("return out;"), "source:\n{source}");
    assert!(source.contains("float4 fClr;"), "source:\n{source}");
    assert!(source.contains("return fClr;"), "source:\n{source}");
}

#[test]
fn sampling_is_a_direct_member_call() {
    let mut vsh = VertexShader::new();
    let uv = vsh.geometry(0).texture_coordinate_0;
    vsh.set_output("uv", uv);
    let mut fsh = FragmentShader::new();
    let uv_in = fsh.input("uv", ValueType::Float2);
    let channel = fsh.channel(0);
    let sampled = fsh
        .graph
        .sample(channel.attachment, uv_in, SamplerFilter::Nearest);
    fsh.set_color(sampled);

    let source = MslCodeGenerator::new()
        .generate_shader_code(&vsh, &fsh, &pos_uv_attributes())
        .expect("generate");

    assert!(
        source.contains("float4 v1 = tex0.sample(nearestSampler,in.uv);"),
        "source:\n{source}"
    );
    // No generated helper function; Metal selects samplers by value.
    assert!(!source.contains("Sample("), "source:\n{source}");
    assert!(
        source.contains("texture2d<float> tex0 [[ texture(0) ]]) {"),
        "source:\n{source}"
    );
}

#[test]
fn custom_uniforms_are_addressed_positionally() {
    let mut vsh = VertexShader::new();
    let zeta = vsh.custom_uniform("zeta", UniformType::Float);
    vsh.set_output("gain", zeta);
    let mut fsh = FragmentShader::new();
    fsh.custom_uniform("Alpha", UniformType::Vec2);

    let source = MslCodeGenerator::new()
        .generate_shader_code(&vsh, &fsh, &position_attributes())
        .expect("generate");

    // Case-insensitive merge across both documents: Alpha is u0, zeta u1.
    assert!(source.contains("float2 u0;"), "source:\n{source}");
    assert!(source.contains("float u1;"), "source:\n{source}");
    assert!(source.contains("out.gain = uniforms.u1;"), "source:\n{source}");
}

#[test]
fn conflicting_uniform_declarations_fail() {
    let mut vsh = VertexShader::new();
    vsh.custom_uniform("strength", UniformType::Float);
    let mut fsh = FragmentShader::new();
    fsh.custom_uniform("strength", UniformType::Vec4);

    let err = MslCodeGenerator::new()
        .generate_shader_code(&vsh, &fsh, &position_attributes())
        .expect_err("conflicting uniform types must fail");
    assert_eq!(
        err,
        GenerateError::UniformConflict {
            name: "strength".to_owned()
        }
    );
}

#[test]
fn mat4_array_uniforms_declare_capacity_and_index() {
    let mut vsh = VertexShader::new();
    let bones = vsh.custom_uniform("bones", UniformType::Mat4Array(4));
    let joint = vsh.graph.scalar_int(0);
    let bone = vsh.graph.mat4_array_value(bones, joint);
    let position0 = vsh.geometries()[0].position;
    let x = vsh.graph.scalar_int(0);
    let px = vsh.graph.vec3_value(position0, x);
    let skinned = vsh.graph.multiply(bone, px);
    vsh.set_output("weight", skinned);
    let fsh = FragmentShader::new();

    let source = MslCodeGenerator::new()
        .generate_shader_code(&vsh, &fsh, &position_attributes())
        .expect("generate");
    assert!(source.contains("float4x4 u0[4];"), "source:\n{source}");
    assert!(source.contains("uniforms.u0[0]"), "source:\n{source}");
}

#[test]
fn discard_uses_the_metal_intrinsic() {
    let vsh = VertexShader::new();
    let mut fsh = FragmentShader::new();
    let color = fsh.graph.vec4_const(1.0, 1.0, 1.0, 0.0);
    let flag = fsh.graph.scalar_bool(true);
    let guarded = fsh.graph.discard_if(flag, color);
    fsh.set_color(guarded);

    let source = MslCodeGenerator::new()
        .generate_shader_code(&vsh, &fsh, &position_attributes())
        .expect("generate");
    assert!(source.contains("discard_fragment();"), "source:\n{source}");
    assert!(!source.contains("discard;"), "source:\n{source}");
}

#[test]
fn instance_transforms_read_the_instance_buffer() {
    let mut vsh = VertexShader::new();
    let model = vsh.model_matrix();
    let p = vsh.graph.vec4_const(0.0, 0.0, 0.0, 1.0);
    let position = vsh.graph.multiply(model, p);
    vsh.set_position(position);
    let fsh = FragmentShader::new();

    let source = MslCodeGenerator::new()
        .generate_shader_code(&vsh, &fsh, &position_attributes())
        .expect("generate");
    assert!(
        source.contains("float4 v2 = instances[iid].mMtx * v1;"),
        "source:\n{source}"
    );
    assert!(source.contains("int iid = uiid;"), "source:\n{source}");
    assert!(source.contains("out.iid = iid;"), "source:\n{source}");
}
