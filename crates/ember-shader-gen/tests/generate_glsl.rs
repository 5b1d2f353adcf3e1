use ember_shader_gen::{GlslCodeGenerator, GlslVersion, InputAttribute};
use ember_shader_graph::{
    Comparison, FragmentShader, SamplerFilter, SwitchCase, UniformType, ValueType, VertexShader,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn generator() -> GlslCodeGenerator {
    GlslCodeGenerator::new(GlslVersion::V330Core)
}

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
fn default_outputs_when_nothing_is_bound() {
    init_tracing();
    let vsh = VertexShader::new();
    let fsh = FragmentShader::new();
    let sources = generator()
        .generate_shader_code(&vsh, &fsh, &position_attributes())
        .expect("generate");

    assert!(
        sources.vertex.contains("#version 330 core"),
        "vertex source:\n{}",
        sources.vertex
    );
    // The default position path declares the projection*view and
    // (projection*view)*model products, then transforms attribute 0.
    assert!(
        sources.vertex.contains("mat4 v1 = pMtx * vMtx;"),
        "vertex source:\n{}",
        sources.vertex
    );
    assert!(
        sources.vertex.contains("mat4 v2 = v1 * mMtx;"),
        "vertex source:\n{}",
        sources.vertex
    );
    assert!(
        sources
            .vertex
            .contains("gl_Position = v2 * vec4(iPos0,1.0);"),
        "vertex source:\n{}",
        sources.vertex
    );
    assert!(
        sources.vertex.contains("layout(location = 0) in vec3 iPos0;"),
        "vertex source:\n{}",
        sources.vertex
    );
    // The per-instance model matrix rides after the caller's attributes.
    assert!(
        sources.vertex.contains("layout(location = 1) in mat4 mMtx;"),
        "vertex source:\n{}",
        sources.vertex
    );

    assert!(
        sources
            .fragment
            .contains("fClr = vec4(0.5,0.5,0.5,1.0);"),
        "fragment source:\n{}",
        sources.fragment
    );
    assert!(
        sources
            .fragment
            .contains("layout(location = 0) out vec4 fClr;"),
        "fragment source:\n{}",
        sources.fragment
    );
}

#[test]
fn operations_declare_in_dependency_order() {
    init_tracing();
    let mut vsh = VertexShader::new();
    let color_in = vsh.geometry(0).color;
    let offset = vsh.graph.vec4_const(1.0, 0.0, 0.0, 1.0);
    let sum = vsh.graph.add(color_in, offset);
    let model = vsh.model_matrix();
    let position = vsh.graph.multiply(model, sum);
    vsh.set_position(position);
    let fsh = FragmentShader::new();

    let sources = generator()
        .generate_shader_code(&vsh, &fsh, &position_attributes())
        .expect("generate");
    let vertex = &sources.vertex;

    let composite = vertex
        .find("vec4 v1 = vec4(1.0,0.0,0.0,1.0);")
        .unwrap_or_else(|| panic!("missing composite declaration:\n{vertex}"));
    let sum_decl = vertex
        .find("vec4 v2 = iClr0 + v1;")
        .unwrap_or_else(|| panic!("missing sum declaration:\n{vertex}"));
    let product = vertex
        .find("vec4 v3 = mMtx * v2;")
        .unwrap_or_else(|| panic!("missing product declaration:\n{vertex}"));
    let assignment = vertex
        .find("gl_Position = v3;")
        .unwrap_or_else(|| panic!("missing position assignment:\n{vertex}"));
    assert!(composite < sum_decl && sum_decl < product && product < assignment);
}

#[test]
fn shared_nodes_are_declared_once_and_reused() {
    init_tracing();
    let mut vsh = VertexShader::new();
    let a = vsh.graph.scalar_float(1.0);
    let b = vsh.graph.scalar_float(2.0);
    let sum = vsh.graph.add(a, b);
    vsh.set_output("brightness", sum);
    vsh.set_output("fade", sum);
    let fsh = FragmentShader::new();

    let sources = generator()
        .generate_shader_code(&vsh, &fsh, &position_attributes())
        .expect("generate");
    let vertex = &sources.vertex;

    // v1/v2 are the default position products; the shared sum is v3.
    assert_eq!(
        vertex.matches("float v3 = 1.0 + 2.0;").count(),
        1,
        "vertex source:\n{vertex}"
    );
    assert!(vertex.contains("io_brightness = v3;"), "vertex source:\n{vertex}");
    assert!(vertex.contains("io_fade = v3;"), "vertex source:\n{vertex}");
    assert!(vertex.contains("out float io_brightness;"), "vertex source:\n{vertex}");
}

#[test]
fn generation_is_deterministic() {
    init_tracing();
    let mut vsh = VertexShader::new();
    let uv = vsh.geometry(0).texture_coordinate_0;
    vsh.set_output("uv", uv);
    let mut fsh = FragmentShader::new();
    let uv_in = fsh.input("uv", ValueType::Float2);
    let channel = fsh.channel(0);
    let sampled = fsh.graph.sample(channel.attachment, uv_in, SamplerFilter::Linear);
    fsh.set_color(sampled);

    let attributes = vec![
        InputAttribute::VertexInPosition { geometry_index: 0 },
        InputAttribute::VertexInTexCoord0 { geometry_index: 0 },
    ];
    let first = generator()
        .generate_shader_code(&vsh, &fsh, &attributes)
        .expect("generate");
    let second = generator()
        .generate_shader_code(&vsh, &fsh, &attributes)
        .expect("generate");
    assert_eq!(first, second);
}

#[test]
fn custom_uniform_order_is_independent_of_insertion_order() {
    init_tracing();
    let fsh = FragmentShader::new();

    let mut forward = VertexShader::new();
    forward.custom_uniform("zeta", UniformType::Float);
    forward.custom_uniform("Alpha", UniformType::Vec2);

    let mut reversed = VertexShader::new();
    reversed.custom_uniform("Alpha", UniformType::Vec2);
    reversed.custom_uniform("zeta", UniformType::Float);

    let attributes = position_attributes();
    let a = generator()
        .generate_shader_code(&forward, &fsh, &attributes)
        .expect("generate");
    let b = generator()
        .generate_shader_code(&reversed, &fsh, &attributes)
        .expect("generate");
    assert_eq!(a.vertex, b.vertex);

    let alpha = a.vertex.find("uniform vec2 u_Alpha;").expect("Alpha uniform");
    let zeta = a.vertex.find("uniform float u_zeta;").expect("zeta uniform");
    assert!(alpha < zeta, "vertex source:\n{}", a.vertex);
}

#[test]
fn missing_varying_fails_linkage() {
    init_tracing();
    let vsh = VertexShader::new();
    let mut fsh = FragmentShader::new();
    fsh.input("uv", ValueType::Float2);

    let err = generator()
        .generate_shader_code(&vsh, &fsh, &position_attributes())
        .expect_err("linkage must fail");
    assert_eq!(
        err,
        ember_shader_gen::GenerateError::Linkage {
            varying: "uv".to_owned()
        }
    );
}

#[test]
fn point_size_output_is_assigned() {
    init_tracing();
    let mut vsh = VertexShader::new();
    let size = vsh.graph.scalar_float(8.0);
    vsh.set_point_size(size);
    let fsh = FragmentShader::new();

    let sources = generator()
        .generate_shader_code(&vsh, &fsh, &position_attributes())
        .expect("generate");
    assert!(
        sources.vertex.contains("gl_PointSize = 8.0;"),
        "vertex source:\n{}",
        sources.vertex
    );
}

#[test]
fn texture_sampling_goes_through_the_material_struct() {
    init_tracing();
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

    let sources = generator()
        .generate_shader_code(&vsh, &fsh, &pos_uv_attributes())
        .expect("generate");
    let fragment = &sources.fragment;
    assert!(
        fragment.contains("vec4 v1 = texture(material_0.texture,io_uv);"),
        "fragment source:\n{fragment}"
    );
    assert!(fragment.contains("fClr = v1;"), "fragment source:\n{fragment}");
    assert!(
        fragment.contains("uniform Material material_0;"),
        "fragment source:\n{fragment}"
    );
}

#[test]
fn discard_guards_emit_a_discard_statement() {
    init_tracing();
    let vsh = VertexShader::new();
    let mut fsh = FragmentShader::new();
    let color = fsh.graph.vec4_const(1.0, 0.0, 0.0, 0.0);
    let alpha_index = fsh.graph.scalar_int(3);
    let alpha = fsh.graph.vec4_value(color, alpha_index);
    let zero = fsh.graph.scalar_float(0.0);
    let is_zero = fsh.graph.compare(alpha, Comparison::LessEqual, zero);
    let guarded = fsh.graph.discard_if(is_zero, color);
    fsh.set_color(guarded);

    let sources = generator()
        .generate_shader_code(&vsh, &fsh, &position_attributes())
        .expect("generate");
    let fragment = &sources.fragment;
    assert!(
        fragment.contains("bool v2 = v1[3] <= 0.0;"),
        "fragment source:\n{fragment}"
    );
    assert!(fragment.contains("if (v2) {"), "fragment source:\n{fragment}");
    assert!(fragment.contains("discard;"), "fragment source:\n{fragment}");
}

#[test]
fn switch_selects_into_a_single_variable() {
    init_tracing();
    let vsh = VertexShader::new();
    let mut fsh = FragmentShader::new();
    let selector = fsh.custom_uniform("mode", UniformType::Int);
    let red = fsh.graph.vec4_const(1.0, 0.0, 0.0, 1.0);
    let green = fsh.graph.vec4_const(0.0, 1.0, 0.0, 1.0);
    let zero = fsh.graph.scalar_int(0);
    let one = fsh.graph.scalar_int(1);
    let chosen = fsh.graph.switch_value(
        selector,
        vec![
            SwitchCase {
                compare: zero,
                result: red,
            },
            SwitchCase {
                compare: one,
                result: green,
            },
        ],
    );
    fsh.set_color(chosen);

    let sources = generator()
        .generate_shader_code(&vsh, &fsh, &position_attributes())
        .expect("generate");
    let fragment = &sources.fragment;
    assert!(
        fragment.contains("switch (u_mode) {"),
        "fragment source:\n{fragment}"
    );
    assert!(fragment.contains("case 0: {"), "fragment source:\n{fragment}");
    assert!(fragment.contains("case 1: {"), "fragment source:\n{fragment}");
    assert_eq!(
        fragment.matches("break;").count(),
        2,
        "fragment source:\n{fragment}"
    );
}
