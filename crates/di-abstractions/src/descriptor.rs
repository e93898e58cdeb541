//! 组件描述符
//!
//! 描述符是注册时一次性构建的静态元数据：组件满足的规格、具体实现、
//! 声明的依赖以及生命周期钩子。构建完成后不可变。
//!
//! Rust 没有运行时反射，构造函数、字段写入和 setter 调用都以小型适配函数的
//! 形式在注册时提供，解析逻辑只通过类型擦除后的句柄调用它们。

use di_common::{
    BoxError, DependencyError, DependencyResult, InstantiationPolicy, TypeInfo,
};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// 私有实例：已构造但尚未发布的具体类型
pub type AnyInstance = Box<dyn Any + Send + Sync>;

/// 公开实例：内部保存 `Arc<I>`，其中 `I` 是规格类型
pub type SharedInstance = Arc<dyn Any + Send + Sync>;

/// 私有实例的借用形式
pub type AnyComponent = dyn Any + Send + Sync;

type ConstructFn = Box<dyn Fn(&ConstructorArgs) -> Result<AnyInstance, BoxError> + Send + Sync>;
type InjectFn = Box<dyn Fn(&mut AnyComponent, SharedInstance) -> Result<(), BoxError> + Send + Sync>;
type HookFn = Box<dyn Fn(&mut AnyComponent) -> Result<(), BoxError> + Send + Sync>;
type PublishFn = Box<dyn Fn(AnyInstance) -> Result<SharedInstance, BoxError> + Send + Sync>;
type DisposeFn = Box<dyn Fn(&SharedInstance) -> Result<(), BoxError> + Send + Sync>;
type IdentityFn = fn(&SharedInstance) -> Option<usize>;

/// 从公开实例中取出指定规格的 `Arc`
pub fn downcast_instance<I>(instance: &SharedInstance) -> DependencyResult<Arc<I>>
where
    I: ?Sized + Send + Sync + 'static,
{
    instance.downcast_ref::<Arc<I>>().cloned().ok_or_else(|| {
        DependencyError::misconfigured(format!(
            "实例类型与规格 {} 不匹配",
            TypeInfo::of::<I>()
        ))
    })
}

/// 实例地址，用于在释放时识别实例
pub fn instance_address<I: ?Sized>(instance: &Arc<I>) -> usize {
    Arc::as_ptr(instance).cast::<()>() as usize
}

fn identity_of<I>(instance: &SharedInstance) -> Option<usize>
where
    I: ?Sized + Send + Sync + 'static,
{
    instance.downcast_ref::<Arc<I>>().map(instance_address)
}

/// 注入方式，决定依赖相对于实例化的解析时机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InjectionKind {
    /// 构造函数参数
    Constructor,
    /// 字段写入
    Field,
    /// setter 调用
    Setter,
}

/// 解析结果写入的位置
pub enum InjectionTarget {
    /// 构造函数参数槽位
    Argument(usize),
    /// 字段
    Field { name: &'static str, write: InjectFn },
    /// setter 函数
    Setter { name: &'static str, invoke: InjectFn },
}

impl InjectionTarget {
    /// 目标名称
    pub fn name(&self) -> String {
        match self {
            Self::Argument(index) => format!("arg{index}"),
            Self::Field { name, .. } | Self::Setter { name, .. } => (*name).to_string(),
        }
    }

    /// 把解析出的依赖写入目标实例
    pub fn apply(&self, target: &mut AnyComponent, value: SharedInstance) -> Result<(), BoxError> {
        match self {
            Self::Field { write, .. } => write(target, value),
            Self::Setter { invoke, .. } => invoke(target, value),
            Self::Argument(index) => Err(Box::new(DependencyError::misconfigured(format!(
                "构造函数参数 {index} 不能在实例化之后注入"
            )))),
        }
    }
}

impl fmt::Debug for InjectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Argument(index) => f.debug_tuple("Argument").field(index).finish(),
            Self::Field { name, .. } => f.debug_struct("Field").field("name", name).finish(),
            Self::Setter { name, .. } => f.debug_struct("Setter").field("name", name).finish(),
        }
    }
}

/// 声明的依赖
#[derive(Debug)]
pub struct Dependency {
    /// 依赖的规格
    pub specification: TypeInfo,
    /// 限定符，`None` 表示默认实例
    pub instance_id: Option<String>,
    /// 注入方式
    pub kind: InjectionKind,
    /// 写入位置
    pub target: InjectionTarget,
}

/// 生命周期钩子
pub struct LifecycleHook {
    phase: String,
    hook: HookFn,
}

impl LifecycleHook {
    /// 钩子所属阶段
    pub fn phase(&self) -> &str {
        &self.phase
    }

    /// 在私有实例上执行钩子
    pub fn invoke(&self, target: &mut AnyComponent) -> Result<(), BoxError> {
        (self.hook)(target)
    }
}

impl fmt::Debug for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHook")
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

/// 构造函数参数
///
/// 按声明顺序保存已解析的构造函数依赖。
pub struct ConstructorArgs {
    specifications: Vec<TypeInfo>,
    values: Vec<SharedInstance>,
}

impl ConstructorArgs {
    /// 创建参数列表，规格与值按槽位一一对应
    pub fn new(specifications: Vec<TypeInfo>, values: Vec<SharedInstance>) -> Self {
        Self {
            specifications,
            values,
        }
    }

    /// 取出指定槽位的参数
    pub fn get<D>(&self, index: usize) -> DependencyResult<Arc<D>>
    where
        D: ?Sized + Send + Sync + 'static,
    {
        let value = self.values.get(index).ok_or_else(|| {
            DependencyError::misconfigured(format!(
                "构造函数参数 {index} 未声明（共 {} 个）",
                self.values.len()
            ))
        })?;
        let expected = TypeInfo::of::<D>();
        if let Some(declared) = self.specifications.get(index) {
            if *declared != expected {
                return Err(DependencyError::misconfigured(format!(
                    "构造函数参数 {index} 声明为 {declared}，但按 {expected} 读取"
                )));
            }
        }
        downcast_instance::<D>(value)
    }

    /// 参数数量
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 是否没有参数
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// 组件描述符
pub struct ComponentDescriptor {
    specification: TypeInfo,
    implementation: TypeInfo,
    category: String,
    policy: InstantiationPolicy,
    dependencies: Vec<Dependency>,
    lifecycle_hooks: Vec<LifecycleHook>,
    construct: ConstructFn,
    publish: PublishFn,
    identity: IdentityFn,
    dispose: Option<DisposeFn>,
}

impl ComponentDescriptor {
    /// 规格即实现的组件
    pub fn concrete<C>() -> ComponentDescriptorBuilder<C, C>
    where
        C: Send + Sync + 'static,
    {
        ComponentDescriptorBuilder::new(|component: Arc<C>| component)
    }

    /// 实现某个规格（通常是 `dyn Trait`）的组件
    ///
    /// `upcast` 把具体实现转换为规格类型，编译期即保证实现满足规格：
    ///
    /// ```ignore
    /// ComponentDescriptor::implementing::<dyn Clock, SystemClock>(|clock| clock)
    /// ```
    pub fn implementing<I, C>(
        upcast: impl Fn(Arc<C>) -> Arc<I> + Send + Sync + 'static,
    ) -> ComponentDescriptorBuilder<I, C>
    where
        I: ?Sized + Send + Sync + 'static,
        C: Send + Sync + 'static,
    {
        ComponentDescriptorBuilder::new(upcast)
    }

    /// 预先构建好的单例实例
    pub fn instance<I>(instance: Arc<I>) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let specification = TypeInfo::of::<I>();
        Self {
            specification,
            implementation: specification,
            category: "instance".to_string(),
            policy: InstantiationPolicy::Singleton,
            dependencies: Vec::new(),
            lifecycle_hooks: Vec::new(),
            construct: Box::new(move |_: &ConstructorArgs| -> Result<AnyInstance, BoxError> {
                Ok(Box::new(Arc::clone(&instance)))
            }),
            publish: Box::new(|private: AnyInstance| -> Result<SharedInstance, BoxError> {
                let instance = private.downcast::<Arc<I>>().map_err(|_| {
                    DependencyError::misconfigured(format!(
                        "预构建实例类型与规格 {} 不匹配",
                        TypeInfo::of::<I>()
                    ))
                })?;
                Ok(Arc::new(*instance) as SharedInstance)
            }),
            identity: identity_of::<I>,
            dispose: None,
        }
    }

    /// 规格
    pub fn specification(&self) -> TypeInfo {
        self.specification
    }

    /// 实现
    pub fn implementation(&self) -> TypeInfo {
        self.implementation
    }

    /// 分类标签，仅用于日志和诊断
    pub fn category(&self) -> &str {
        &self.category
    }

    /// 实例化策略
    pub fn policy(&self) -> InstantiationPolicy {
        self.policy
    }

    /// 全部依赖，按声明顺序
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// 指定注入方式的依赖，按声明顺序
    pub fn dependencies_of(&self, kind: InjectionKind) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(move |dep| dep.kind == kind)
    }

    /// 生命周期钩子，按声明顺序
    pub fn lifecycle_hooks(&self) -> &[LifecycleHook] {
        &self.lifecycle_hooks
    }

    /// 调用构造函数
    pub fn construct(&self, args: &ConstructorArgs) -> Result<AnyInstance, BoxError> {
        (self.construct)(args)
    }

    /// 把私有实例转换为公开实例
    pub fn publish(&self, private: AnyInstance) -> Result<SharedInstance, BoxError> {
        (self.publish)(private)
    }

    /// 公开实例的地址；实例不满足规格时返回 `None`
    pub fn identity(&self, instance: &SharedInstance) -> Option<usize> {
        (self.identity)(instance)
    }

    /// 调用销毁钩子（如果声明了）
    pub fn dispose(&self, instance: &SharedInstance) -> Result<(), BoxError> {
        match &self.dispose {
            Some(dispose) => dispose(instance),
            None => Ok(()),
        }
    }

    /// 诊断用名称：`规格(实现)`
    pub fn display_name(&self) -> String {
        if self.specification == self.implementation {
            self.specification.short_name().to_string()
        } else {
            format!(
                "{}({})",
                self.specification.short_name(),
                self.implementation.short_name()
            )
        }
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("specification", &self.specification.name)
            .field("implementation", &self.implementation.name)
            .field("category", &self.category)
            .field("policy", &self.policy)
            .field("dependencies", &self.dependencies)
            .field("lifecycle_hooks", &self.lifecycle_hooks)
            .field("dispose", &self.dispose.is_some())
            .finish()
    }
}

/// 组件描述符构建器
///
/// `I` 是规格类型，`C` 是具体实现类型。
pub struct ComponentDescriptorBuilder<I: ?Sized, C> {
    category: String,
    policy: InstantiationPolicy,
    dependencies: Vec<Dependency>,
    lifecycle_hooks: Vec<LifecycleHook>,
    construct: Option<ConstructFn>,
    publish: PublishFn,
    dispose: Option<DisposeFn>,
    constructor_args: usize,
    _marker: PhantomData<fn(Arc<C>) -> Arc<I>>,
}

impl<I, C> ComponentDescriptorBuilder<I, C>
where
    I: ?Sized + Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    fn new(upcast: impl Fn(Arc<C>) -> Arc<I> + Send + Sync + 'static) -> Self {
        Self {
            category: "component".to_string(),
            policy: InstantiationPolicy::default(),
            dependencies: Vec::new(),
            lifecycle_hooks: Vec::new(),
            construct: None,
            publish: Box::new(move |private: AnyInstance| -> Result<SharedInstance, BoxError> {
                let component = private.downcast::<C>().map_err(|_| {
                    DependencyError::misconfigured(format!(
                        "私有实例不是 {}",
                        TypeInfo::of::<C>()
                    ))
                })?;
                Ok(Arc::new(upcast(Arc::new(*component))) as SharedInstance)
            }),
            dispose: None,
            constructor_args: 0,
            _marker: PhantomData,
        }
    }

    /// 设置分类标签
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// 设置实例化策略
    pub fn policy(mut self, policy: InstantiationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 声明下一个构造函数参数，槽位按声明顺序从 0 开始
    pub fn constructor_arg<D>(mut self, qualifier: Option<&str>) -> Self
    where
        D: ?Sized + Send + Sync + 'static,
    {
        self.dependencies.push(Dependency {
            specification: TypeInfo::of::<D>(),
            instance_id: qualifier.map(str::to_string),
            kind: InjectionKind::Constructor,
            target: InjectionTarget::Argument(self.constructor_args),
        });
        self.constructor_args += 1;
        self
    }

    /// 设置构造函数
    pub fn construct_with<F>(mut self, construct: F) -> Self
    where
        F: Fn(&ConstructorArgs) -> Result<C, BoxError> + Send + Sync + 'static,
    {
        self.construct = Some(Box::new(
            move |args: &ConstructorArgs| -> Result<AnyInstance, BoxError> {
                construct(args).map(|component| Box::new(component) as AnyInstance)
            },
        ));
        self
    }

    /// 声明字段依赖
    pub fn field<D, F>(mut self, name: &'static str, qualifier: Option<&str>, write: F) -> Self
    where
        D: ?Sized + Send + Sync + 'static,
        F: Fn(&mut C, Arc<D>) + Send + Sync + 'static,
    {
        let write: InjectFn = Box::new(
            move |target: &mut AnyComponent, value: SharedInstance| -> Result<(), BoxError> {
                let (component, dependency) = Self::unpack::<D>(target, &value)?;
                write(component, dependency);
                Ok(())
            },
        );
        self.dependencies.push(Dependency {
            specification: TypeInfo::of::<D>(),
            instance_id: qualifier.map(str::to_string),
            kind: InjectionKind::Field,
            target: InjectionTarget::Field { name, write },
        });
        self
    }

    /// 声明 setter 依赖
    pub fn setter<D, F>(mut self, name: &'static str, qualifier: Option<&str>, invoke: F) -> Self
    where
        D: ?Sized + Send + Sync + 'static,
        F: Fn(&mut C, Arc<D>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let invoke: InjectFn = Box::new(
            move |target: &mut AnyComponent, value: SharedInstance| -> Result<(), BoxError> {
                let (component, dependency) = Self::unpack::<D>(target, &value)?;
                invoke(component, dependency)
            },
        );
        self.dependencies.push(Dependency {
            specification: TypeInfo::of::<D>(),
            instance_id: qualifier.map(str::to_string),
            kind: InjectionKind::Setter,
            target: InjectionTarget::Setter { name, invoke },
        });
        self
    }

    /// 声明生命周期钩子，钩子按声明顺序执行
    pub fn lifecycle_hook<F>(mut self, phase: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&mut C) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let hook: HookFn = Box::new(move |target: &mut AnyComponent| -> Result<(), BoxError> {
            let component = target.downcast_mut::<C>().ok_or_else(|| {
                DependencyError::misconfigured(format!("私有实例不是 {}", TypeInfo::of::<C>()))
            })?;
            hook(component)
        });
        self.lifecycle_hooks.push(LifecycleHook {
            phase: phase.into(),
            hook,
        });
        self
    }

    /// 设置销毁钩子，在实例被容器丢弃时调用
    pub fn on_dispose<F>(mut self, dispose: F) -> Self
    where
        F: Fn(&I) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.dispose = Some(Box::new(move |instance: &SharedInstance| -> Result<(), BoxError> {
            let instance = downcast_instance::<I>(instance)?;
            dispose(&instance)
        }));
        self
    }

    /// 构建描述符
    pub fn build(self) -> DependencyResult<ComponentDescriptor> {
        let specification = TypeInfo::of::<I>();
        let implementation = TypeInfo::of::<C>();
        let construct = self.construct.ok_or_else(|| {
            DependencyError::misconfigured(format!(
                "组件 {implementation} 未提供构造函数"
            ))
        })?;
        if let Some(hook) = self.lifecycle_hooks.iter().find(|h| h.phase.trim().is_empty()) {
            return Err(DependencyError::misconfigured(format!(
                "组件 {implementation} 声明了无效的生命周期阶段 '{}'",
                hook.phase
            )));
        }

        Ok(ComponentDescriptor {
            specification,
            implementation,
            category: self.category,
            policy: self.policy,
            dependencies: self.dependencies,
            lifecycle_hooks: self.lifecycle_hooks,
            construct,
            publish: self.publish,
            identity: identity_of::<I>,
            dispose: self.dispose,
        })
    }

    fn unpack<'a, D>(
        target: &'a mut AnyComponent,
        value: &SharedInstance,
    ) -> Result<(&'a mut C, Arc<D>), BoxError>
    where
        D: ?Sized + Send + Sync + 'static,
    {
        let dependency = downcast_instance::<D>(value)?;
        let component = target.downcast_mut::<C>().ok_or_else(|| {
            DependencyError::misconfigured(format!("私有实例不是 {}", TypeInfo::of::<C>()))
        })?;
        Ok((component, dependency))
    }
}
